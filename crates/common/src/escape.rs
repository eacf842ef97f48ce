/// Escape an arbitrary string so it is a valid D-Bus object path element or
/// bus name component.
///
/// ASCII letters and digits pass through, except a leading digit. Every
/// other byte becomes `_` followed by two lowercase hex digits. The empty
/// string escapes to a lone `_`.
pub fn escape_as_identifier(name: &str) -> String {
    if name.is_empty() {
        return "_".into();
    }

    let mut out = String::with_capacity(name.len());
    for (i, byte) in name.bytes().enumerate() {
        let passthrough = byte.is_ascii_alphabetic() || (i > 0 && byte.is_ascii_digit());
        if passthrough {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("_{byte:02x}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case("", "_")]
    #[case("subscribe", "subscribe")]
    #[case("alice@example.com", "alice_40example_2ecom")]
    #[case("9lives", "_39lives")]
    #[case("a_b", "a_5fb")]
    #[case("é", "_c3_a9")]
    fn escapes(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(escape_as_identifier(input), expected);
    }
}
