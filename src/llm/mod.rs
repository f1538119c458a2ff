// Hosted chat-completion client — used for topic labels and summaries.
//
// The credential always comes from the request body. Nothing in this module
// reads it from the environment, logs it, or keeps it past the client's
// lifetime.

pub mod client;
pub mod rate_limiter;
pub mod traits;

/// Replace every occurrence of `secret` in `text` with a fixed marker.
pub fn redact(text: &str, secret: &str) -> String {
    let secret = secret.trim();
    if secret.is_empty() {
        return text.to_string();
    }
    text.replace(secret, "[REDACTED]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_replaces_every_occurrence() {
        let out = redact("key sk-abc failed; retry with sk-abc", "sk-abc");
        assert_eq!(out, "key [REDACTED] failed; retry with [REDACTED]");
    }

    #[test]
    fn test_redact_ignores_blank_secret() {
        assert_eq!(redact("nothing here", "  "), "nothing here");
    }
}
