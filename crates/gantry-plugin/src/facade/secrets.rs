//! Secrets providers that encrypt values for persistence.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Connection, decode_params, encode_result};
use crate::channel::{PluginChannel, PluginHandler};
use crate::context::PluginContext;
use crate::error::{PluginError, RpcCode, RpcError};

/// Method names on the secrets channel.
pub mod methods {
    /// Encrypts plaintexts.
    pub const ENCRYPT: &str = "secrets/encrypt";
    /// Decrypts ciphertexts.
    pub const DECRYPT: &str = "secrets/decrypt";
}

/// Operations a secrets provider offers.
///
/// Both operations are batched and return one output per input, in order.
pub trait SecretsProvider: Send + Sync {
    /// Encrypts each plaintext.
    ///
    /// # Errors
    ///
    /// Returns the call failure.
    fn encrypt(&self, plaintexts: &[String]) -> Result<Vec<String>, RpcError>;

    /// Decrypts each ciphertext.
    ///
    /// # Errors
    ///
    /// Returns the call failure.
    fn decrypt(&self, ciphertexts: &[String]) -> Result<Vec<String>, RpcError>;
}

#[derive(Serialize, Deserialize)]
struct Plaintexts {
    plaintexts: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct Ciphertexts {
    ciphertexts: Vec<String>,
}

/// Engine-side client for a secrets provider plugin.
pub struct SecretsClient<C> {
    connection: Connection<C>,
}

impl<C: PluginChannel + 'static> SecretsClient<C> {
    /// Wraps a channel to a secrets provider.
    #[must_use]
    pub fn new(name: impl Into<String>, channel: C, context: PluginContext) -> Self {
        Self {
            connection: Connection::new(name.into(), channel, context),
        }
    }

    /// Shuts the secrets provider down.
    ///
    /// # Errors
    ///
    /// Returns the failure to stop the plugin.
    pub fn close(&self) -> Result<(), PluginError> {
        self.connection.close()
    }

    fn check_count(&self, method: &str, sent: usize, received: usize) -> Result<(), RpcError> {
        if sent == received {
            return Ok(());
        }
        Err(RpcError::new(
            RpcCode::Internal,
            format!(
                "{method} on '{}' returned {received} values for {sent} inputs",
                self.connection.name()
            ),
        ))
    }
}

impl<C: PluginChannel + 'static> SecretsProvider for SecretsClient<C> {
    fn encrypt(&self, plaintexts: &[String]) -> Result<Vec<String>, RpcError> {
        let params = Plaintexts {
            plaintexts: plaintexts.to_vec(),
        };
        let result: Ciphertexts = self.connection.call(methods::ENCRYPT, &params)?;
        self.check_count(methods::ENCRYPT, plaintexts.len(), result.ciphertexts.len())?;
        Ok(result.ciphertexts)
    }

    fn decrypt(&self, ciphertexts: &[String]) -> Result<Vec<String>, RpcError> {
        let params = Ciphertexts {
            ciphertexts: ciphertexts.to_vec(),
        };
        let result: Plaintexts = self.connection.call(methods::DECRYPT, &params)?;
        self.check_count(methods::DECRYPT, ciphertexts.len(), result.plaintexts.len())?;
        Ok(result.plaintexts)
    }
}

/// Plugin-side dispatcher from channel requests to a [`SecretsProvider`].
#[derive(Debug)]
pub struct SecretsServer<S> {
    provider: S,
}

impl<S: SecretsProvider> SecretsServer<S> {
    /// Serves `provider`.
    #[must_use]
    pub const fn new(provider: S) -> Self {
        Self { provider }
    }
}

impl<S: SecretsProvider> PluginHandler for SecretsServer<S> {
    fn handle(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            methods::ENCRYPT => {
                let request: Plaintexts = decode_params(method, params)?;
                encode_result(&Ciphertexts {
                    ciphertexts: self.provider.encrypt(&request.plaintexts)?,
                })
            }
            methods::DECRYPT => {
                let request: Ciphertexts = decode_params(method, params)?;
                encode_result(&Plaintexts {
                    plaintexts: self.provider.decrypt(&request.ciphertexts)?,
                })
            }
            _ => Err(RpcError::unimplemented(method)),
        }
    }
}
