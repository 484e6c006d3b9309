//! Client-side authentication.
//!
//! The dialer runs one authentication exchange on the first call of every
//! fresh mux, under the fixed service label `"zx"`. The exchange itself is
//! pluggable: implement [`AuthHandler`] to speak whatever scheme your
//! servers use. The handler's output is an opaque [`AuthInfo`] the handle
//! keeps for the lifetime of the connection.
//!
//! One outcome is special: a failure whose text contains `"auth
//! disabled"` means the server runs without authentication; the dialer
//! logs a warning and proceeds with no auth context.

use async_trait::async_trait;

use treefs_mux::Call;
use treefs_proto::{Frame, FsError, FsResult};

/// Service label the dialer authenticates under.
pub const AUTH_SERVICE: &str = "zx";

/// Opaque authentication context produced by the exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthInfo {
    /// Uid the server granted.
    pub uid: String,
    /// Whether the peer proved its identity (as opposed to being
    /// accepted anonymously).
    pub ok: bool,
}

/// Runs the client half of the authentication exchange.
#[async_trait]
pub trait AuthHandler: Send + Sync {
    /// Authenticate over `call` for the given service label.
    ///
    /// The handler owns both call halves and must close them; errors it
    /// returns fail the dial (except the `"auth disabled"` downgrade).
    async fn client_auth(&self, call: Call, service: &str) -> FsResult<AuthInfo>;
}

/// Default exchange: announce `service user`, accept the uid the server
/// replies with. No cryptography; pair it with a transport that already
/// authenticates the channel, or replace it wholesale.
pub struct PlainAuth {
    user: String,
}

impl PlainAuth {
    pub fn new(user: impl Into<String>) -> Self {
        Self { user: user.into() }
    }
}

#[async_trait]
impl AuthHandler for PlainAuth {
    async fn client_auth(&self, call: Call, service: &str) -> FsResult<AuthInfo> {
        let Call { tx, rx } = call;
        if let Err(e) = tx.send(Frame::Str(format!("{service} {}", self.user))).await {
            tx.close(Some(e.clone()));
            return Err(e);
        }
        tx.close(None);
        match rx.one().await? {
            Frame::Str(uid) => Ok(AuthInfo { uid, ok: true }),
            _ => Err(FsError::BadMsg),
        }
    }
}
