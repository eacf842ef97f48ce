use {lilac_common::HandleType, tracing::debug};

use crate::{ChannelFactory, ChannelInfo, RequestStatus};

/// Registry of the channel factories owned by one connection.
pub struct FactoryRegistry {
    factories: Vec<Box<dyn ChannelFactory>>,
}

impl Default for FactoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self {
            factories: Vec::new(),
        }
    }

    pub fn register(&mut self, factory: Box<dyn ChannelFactory>) {
        debug!(factory = factory.name(), "registered channel factory");
        self.factories.push(factory);
    }

    /// The registered factory of concrete type `T`.
    pub fn get<T: ChannelFactory>(&self) -> Option<&T> {
        self.factories
            .iter()
            .find_map(|f| f.as_any().downcast_ref::<T>())
    }

    pub fn get_mut<T: ChannelFactory>(&mut self) -> Option<&mut T> {
        self.factories
            .iter_mut()
            .find_map(|f| f.as_any_mut().downcast_mut::<T>())
    }

    pub fn list(&self) -> Vec<&'static str> {
        self.factories.iter().map(|f| f.name()).collect()
    }

    pub fn connecting(&mut self) {
        self.factories.iter_mut().for_each(|f| f.connecting());
    }

    pub fn connected(&mut self) {
        self.factories.iter_mut().for_each(|f| f.connected());
    }

    pub fn disconnected(&mut self) {
        self.factories.iter_mut().for_each(|f| f.disconnected());
    }

    pub fn close_all(&mut self) {
        self.factories.iter_mut().for_each(|f| f.close_all());
    }

    pub fn channels(&self) -> Vec<ChannelInfo> {
        self.factories.iter().flat_map(|f| f.channels()).collect()
    }

    /// Offer the request to each factory in turn. The first factory that
    /// does not answer [`RequestStatus::NotImplemented`] decides.
    pub fn request(
        &mut self,
        channel_type: &str,
        handle_type: HandleType,
        handle: u32,
        suppress_handler: bool,
    ) -> RequestStatus {
        for factory in &mut self.factories {
            match factory.request(channel_type, handle_type, handle, suppress_handler) {
                RequestStatus::NotImplemented => continue,
                status => {
                    debug!(
                        factory = factory.name(),
                        channel_type,
                        ?handle_type,
                        handle,
                        ?status,
                        "channel request answered"
                    );
                    return status;
                },
            }
        }
        RequestStatus::NotImplemented
    }
}
