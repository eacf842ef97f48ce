//! Contact list channels.
//!
//! Only the `subscribe` list is served. Group channels and the
//! publish/known/deny lists are not implemented.

use std::{
    any::Any,
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use {
    lilac_common::{
        Handle, HandleType, escape_as_identifier,
        names::{IFACE_CHANNEL_INTERFACE_GROUP, IFACE_CHANNEL_TYPE_CONTACT_LIST},
    },
    lilac_handles::HandleRepo,
    tracing::{debug, warn},
};

use crate::{
    ChannelContext, ChannelEvent, ChannelFactory, ChannelInfo, Error, RequestStatus, Result,
};

const SUBSCRIBE: &str = "subscribe";

/// One list channel (e.g. the `subscribe` roster).
pub struct ListChannel {
    object_path: String,
    handle: Handle,
    members: BTreeSet<Handle>,
}

impl ListChannel {
    pub fn object_path(&self) -> &str {
        &self.object_path
    }

    pub fn channel_type(&self) -> &'static str {
        IFACE_CHANNEL_TYPE_CONTACT_LIST
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn handle_type(&self) -> HandleType {
        HandleType::List
    }

    pub fn interfaces(&self) -> Vec<&'static str> {
        vec![IFACE_CHANNEL_INTERFACE_GROUP]
    }

    pub fn members(&self) -> Vec<u32> {
        self.members.iter().map(|h| h.get()).collect()
    }

    /// Nobody can be added to or removed from the roster through this
    /// channel, so no group flags are set.
    pub fn group_flags(&self) -> u32 {
        0
    }

    fn info(&self) -> ChannelInfo {
        ChannelInfo {
            object_path: self.object_path.clone(),
            channel_type: IFACE_CHANNEL_TYPE_CONTACT_LIST,
            handle_type: HandleType::List,
            handle: self.handle.get(),
        }
    }
}

/// Owns the list channels of one connection.
pub struct ContactListFactory {
    ctx: Arc<ChannelContext>,
    list_channels: HashMap<Handle, ListChannel>,
}

impl ContactListFactory {
    pub fn new(ctx: Arc<ChannelContext>) -> Self {
        Self {
            ctx,
            list_channels: HashMap::new(),
        }
    }

    pub fn get(&self, handle: Handle) -> Option<&ListChannel> {
        self.list_channels.get(&handle)
    }

    pub fn find_by_path(&self, object_path: &str) -> Option<&ListChannel> {
        self.list_channels
            .values()
            .find(|c| c.object_path == object_path)
    }

    pub fn len(&self) -> usize {
        self.list_channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list_channels.is_empty()
    }

    /// Create the list channel for `handle`. Fails if one already exists.
    pub fn create_channel(&mut self, handle: Handle) -> Result<ChannelInfo> {
        if self.list_channels.contains_key(&handle) {
            return Err(Error::DuplicateChannel {
                channel_type: "ContactList",
                handle: handle.get(),
            });
        }

        let name = self.ctx.handles().lists().inspect(handle)?;
        let object_path = format!(
            "{}/ContactListChannel/List/{}",
            self.ctx.object_path(),
            escape_as_identifier(&name)
        );
        debug!(%handle, %name, %object_path, "instantiating list channel");

        let chan = ListChannel {
            object_path,
            handle,
            members: BTreeSet::new(),
        };
        let info = chan.info();
        self.list_channels.insert(handle, chan);
        self.ctx.emit(ChannelEvent::NewChannel {
            info: info.clone(),
            suppress_handler: false,
        });
        Ok(info)
    }

    fn ensure_channel(&mut self, handle: Handle) -> Result<&mut ListChannel> {
        if !self.list_channels.contains_key(&handle) {
            self.create_channel(handle)?;
        }
        self.list_channels
            .get_mut(&handle)
            .ok_or_else(|| Error::unavailable(format!("list channel {handle} vanished")))
    }

    /// Add `members` to the list channel `list`, taking a reference on each
    /// new member and emitting `MembersChanged` for the ones that were added.
    fn add_members(&mut self, list: Handle, members: Vec<Handle>) -> Result<()> {
        let ctx = Arc::clone(&self.ctx);
        let chan = self.ensure_channel(list)?;
        let mut added = Vec::new();
        for member in members {
            if chan.members.contains(&member) {
                continue;
            }
            ctx.handles().contacts().ref_handle(member)?;
            chan.members.insert(member);
            added.push(member.get());
        }
        if added.is_empty() {
            return Ok(());
        }
        added.sort_unstable();
        ctx.emit(ChannelEvent::MembersChanged {
            object_path: chan.object_path.clone(),
            message: String::new(),
            added,
            removed: Vec::new(),
            local_pending: Vec::new(),
            remote_pending: Vec::new(),
            actor: 0,
            reason: 0,
        });
        Ok(())
    }

    fn publish_roster(&mut self) -> Result<()> {
        let account = self.ctx.require_account()?;
        let contacts = self.ctx.handles().contacts();
        let mut members = Vec::new();
        for buddy in account.buddies() {
            match contacts.ensure(&buddy.name) {
                Ok(handle) => members.push(handle),
                Err(e) => warn!(buddy = %buddy.name, error = %e, "skipping roster entry"),
            }
        }
        let subscribe = self.ctx.handles().lists().ensure(SUBSCRIBE)?;
        self.add_members(subscribe, members)
    }
}

impl ChannelFactory for ContactListFactory {
    fn name(&self) -> &'static str {
        "contact-list"
    }

    fn close_all(&mut self) {
        let contacts = self.ctx.handles().contacts();
        for (_, chan) in self.list_channels.drain() {
            for member in &chan.members {
                if let Err(e) = contacts.unref_handle(*member) {
                    debug!(%member, error = %e, "releasing list member");
                }
            }
            self.ctx.emit(ChannelEvent::Closed {
                object_path: chan.object_path,
            });
        }
        debug_assert!(self.list_channels.is_empty());
    }

    fn connected(&mut self) {
        if let Err(e) = self.publish_roster() {
            warn!(error = %e, "could not publish roster");
        }
    }

    fn channels(&self) -> Vec<ChannelInfo> {
        self.list_channels.values().map(ListChannel::info).collect()
    }

    fn request(
        &mut self,
        channel_type: &str,
        handle_type: HandleType,
        handle: u32,
        _suppress_handler: bool,
    ) -> RequestStatus {
        if channel_type != IFACE_CHANNEL_TYPE_CONTACT_LIST {
            return RequestStatus::NotImplemented;
        }
        match handle_type {
            HandleType::List => {},
            HandleType::Group => return RequestStatus::NotImplemented,
            other => {
                return RequestStatus::NotAvailable(format!(
                    "contact lists cannot target handle type {}",
                    other.as_u32()
                ));
            },
        }

        let Ok(handle) = self.ctx.handles().lists().validate(handle) else {
            return RequestStatus::InvalidHandle;
        };
        if let Some(chan) = self.list_channels.get(&handle) {
            return RequestStatus::Existing(chan.info());
        }
        match self.create_channel(handle) {
            Ok(info) => RequestStatus::Created(info),
            Err(e) => RequestStatus::Error(e),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        lilac_engine::{Buddy, Engine, loopback::LoopbackEngine},
        lilac_handles::HandleRepos,
        rstest::rstest,
        tokio::sync::mpsc,
    };

    const CONN: &str = "/org/freedesktop/Telepathy/Connection/lilac/loopback/me";

    fn setup() -> (ContactListFactory, Arc<ChannelContext>, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let ctx = Arc::new(ChannelContext::new(CONN, Arc::new(HandleRepos::new()), Arc::new(tx)));
        (ContactListFactory::new(Arc::clone(&ctx)), ctx, rx)
    }

    fn subscribe_handle() -> Handle {
        Handle::new(1).unwrap()
    }

    #[test]
    fn duplicate_channel_is_rejected() {
        let (mut factory, _ctx, _rx) = setup();
        factory.create_channel(subscribe_handle()).unwrap();
        assert!(matches!(
            factory.create_channel(subscribe_handle()),
            Err(Error::DuplicateChannel { handle: 1, .. })
        ));
        assert_eq!(factory.len(), 1);
    }

    #[test]
    fn channel_path_uses_escaped_list_name() {
        let (mut factory, _ctx, mut rx) = setup();
        let info = factory.create_channel(subscribe_handle()).unwrap();
        assert_eq!(info.object_path, format!("{CONN}/ContactListChannel/List/subscribe"));
        assert!(matches!(rx.try_recv(), Ok(ChannelEvent::NewChannel { .. })));
    }

    #[rstest]
    #[case("org.freedesktop.Telepathy.Channel.Type.Text", HandleType::List, 1, "not-implemented")]
    #[case(IFACE_CHANNEL_TYPE_CONTACT_LIST, HandleType::Group, 1, "not-implemented")]
    #[case(IFACE_CHANNEL_TYPE_CONTACT_LIST, HandleType::Contact, 1, "not-available")]
    #[case(IFACE_CHANNEL_TYPE_CONTACT_LIST, HandleType::List, 7, "invalid-handle")]
    #[case(IFACE_CHANNEL_TYPE_CONTACT_LIST, HandleType::List, 1, "created")]
    fn request_rules(
        #[case] channel_type: &str,
        #[case] handle_type: HandleType,
        #[case] handle: u32,
        #[case] expected: &str,
    ) {
        let (mut factory, _ctx, _rx) = setup();
        let got = match factory.request(channel_type, handle_type, handle, false) {
            RequestStatus::Created(_) => "created",
            RequestStatus::Existing(_) => "existing",
            RequestStatus::NotImplemented => "not-implemented",
            RequestStatus::NotAvailable(_) => "not-available",
            RequestStatus::InvalidHandle => "invalid-handle",
            RequestStatus::Error(_) => "error",
        };
        assert_eq!(got, expected);
    }

    #[test]
    fn second_request_returns_existing() {
        let (mut factory, _ctx, _rx) = setup();
        let first = factory.request(IFACE_CHANNEL_TYPE_CONTACT_LIST, HandleType::List, 1, false);
        let second = factory.request(IFACE_CHANNEL_TYPE_CONTACT_LIST, HandleType::List, 1, false);
        match (first, second) {
            (RequestStatus::Created(a), RequestStatus::Existing(b)) => assert_eq!(a, b),
            other => panic!("unexpected statuses: {other:?}"),
        }
    }

    #[test]
    fn connected_publishes_roster() {
        let (mut factory, ctx, mut rx) = setup();
        let engine = LoopbackEngine::new()
            .with_buddy(Buddy::new("alice"))
            .with_buddy(Buddy::new("bob"));
        let account = engine.new_account("me", "loopback").unwrap();
        let me = ctx.handles().contacts().ensure("me").unwrap();
        ctx.set_session(account, me);

        factory.connected();

        assert!(matches!(rx.try_recv(), Ok(ChannelEvent::NewChannel { .. })));
        match rx.try_recv().unwrap() {
            ChannelEvent::MembersChanged { added, .. } => assert_eq!(added.len(), 2),
            other => panic!("unexpected event: {other:?}"),
        }
        let chan = factory.get(subscribe_handle()).unwrap();
        assert_eq!(chan.members().len(), 2);
        let alice = ctx.handles().contacts().lookup("alice").unwrap();
        assert_eq!(ctx.handles().contacts().ref_count(alice), Some(1));
    }

    #[test]
    fn close_all_empties_and_releases() {
        let (mut factory, ctx, mut rx) = setup();
        let engine = LoopbackEngine::new().with_buddy(Buddy::new("alice"));
        let account = engine.new_account("me", "loopback").unwrap();
        let me = ctx.handles().contacts().ensure("me").unwrap();
        ctx.set_session(account, me);
        factory.connected();
        while rx.try_recv().is_ok() {}

        factory.close_all();

        assert!(factory.is_empty());
        assert!(matches!(rx.try_recv(), Ok(ChannelEvent::Closed { .. })));
        let alice = ctx.handles().contacts().lookup("alice").unwrap();
        assert_eq!(ctx.handles().contacts().ref_count(alice), Some(0));
    }
}
