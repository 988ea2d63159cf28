use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("No session id found in the session store")]
    NoSessionId,
    #[error("No state parameter in the callback")]
    NoStateParameter,
    #[error("No code parameter in the callback")]
    NoCodeParameter,
    #[error("Anti-forgery token is malformed")]
    MalformedToken,
    #[error("Anti-forgery token signature matches no known secret")]
    InvalidSignature,
    #[error("Anti-forgery token algorithm does not match the configured algorithm")]
    AlgorithmMismatch,
    #[error("Anti-forgery token has expired")]
    Expired,
    #[error("Anti-forgery token was issued for a different session")]
    SessionMismatch,
    #[error("Email domain does not match the configured domain")]
    DomainMismatch,
    #[error("Google returned an error: {0}")]
    ProviderError(String),
    #[error("Failed to reach Google: {0}")]
    Network(String),
    #[error("Failed to Decode IDToken")]
    Decode,
    #[error("Failed to Deserialize")]
    Deserialize,
    #[error("Failed to generate token")]
    GenToken,
    #[error("Failed to parse url")]
    URL,
}

impl Error {
    /// `true` for failures of the anti-forgery check on the callback.
    ///
    /// These mean the login attempt cannot be trusted and the user should be
    /// sent through the login flow again.
    pub fn is_anti_forgery(&self) -> bool {
        matches!(
            self,
            Error::NoSessionId
                | Error::NoStateParameter
                | Error::MalformedToken
                | Error::InvalidSignature
                | Error::AlgorithmMismatch
                | Error::Expired
                | Error::SessionMismatch
        )
    }
}
