//! Named constants for the handler RPC.
//!
//! Shared between the broker (dispatcher spans) and the askpass bridge (error
//! reporting) so that method names stay in sync without duplicating string
//! literals.

/// Fixed identifier the dispatcher is registered under on the endpoint.
pub const HANDLER_NAME: &str = "gitssh.v1.GitSshHandler";

/// `GitSshHandler/VerifyServerHostKey`
pub const METHOD_VERIFY_SERVER_HOST_KEY: &str = "GitSshHandler/VerifyServerHostKey";

/// `GitSshHandler/AskPassphrase`
pub const METHOD_ASK_PASSPHRASE: &str = "GitSshHandler/AskPassphrase";

/// `GitSshHandler/ReplyToChallenge`
pub const METHOD_REPLY_TO_CHALLENGE: &str = "GitSshHandler/ReplyToChallenge";

/// `GitSshHandler/AskPassword`
pub const METHOD_ASK_PASSWORD: &str = "GitSshHandler/AskPassword";

/// `GitSshHandler/SetLastSuccessful`
pub const METHOD_SET_LAST_SUCCESSFUL: &str = "GitSshHandler/SetLastSuccessful";

/// `GitSshHandler/GetLastSuccessful`
pub const METHOD_GET_LAST_SUCCESSFUL: &str = "GitSshHandler/GetLastSuccessful";

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn method_names_share_the_service_prefix() {
        let service = HANDLER_NAME.rsplit('.').next().unwrap_or_default();
        for method in [
            METHOD_VERIFY_SERVER_HOST_KEY,
            METHOD_ASK_PASSPHRASE,
            METHOD_REPLY_TO_CHALLENGE,
            METHOD_ASK_PASSWORD,
            METHOD_SET_LAST_SUCCESSFUL,
            METHOD_GET_LAST_SUCCESSFUL,
        ] {
            assert!(method.starts_with(&format!("{service}/")), "{method}");
        }
    }
}
