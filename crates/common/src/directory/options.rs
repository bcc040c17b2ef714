use serde::{Deserialize, Serialize};

/// Option name controlling the receive flag of newly generated addresses
pub const NEW_ADDRESS_RECV: &str = "newAddressRecv";
/// Option name controlling the anon flag of newly generated addresses
pub const NEW_ADDRESS_ANON: &str = "newAddressAnon";

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum OptionError {
    #[error("option not found: {0}")]
    OptionNotFound(String),
}

/// Process-wide boolean toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagingOptions {
    #[serde(default = "enabled_by_default")]
    pub new_address_recv: bool,
    #[serde(default = "enabled_by_default")]
    pub new_address_anon: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl Default for MessagingOptions {
    fn default() -> Self {
        Self {
            new_address_recv: true,
            new_address_anon: true,
        }
    }
}

impl MessagingOptions {
    /// All options with their current values, in a fixed order
    pub fn list(&self) -> Vec<(&'static str, bool)> {
        vec![
            (NEW_ADDRESS_RECV, self.new_address_recv),
            (NEW_ADDRESS_ANON, self.new_address_anon),
        ]
    }

    pub fn get(&self, name: &str) -> Result<bool, OptionError> {
        match name {
            NEW_ADDRESS_RECV => Ok(self.new_address_recv),
            NEW_ADDRESS_ANON => Ok(self.new_address_anon),
            _ => Err(OptionError::OptionNotFound(name.to_string())),
        }
    }

    pub fn set(&mut self, name: &str, value: bool) -> Result<(), OptionError> {
        let slot = match name {
            NEW_ADDRESS_RECV => &mut self.new_address_recv,
            NEW_ADDRESS_ANON => &mut self.new_address_anon,
            _ => return Err(OptionError::OptionNotFound(name.to_string())),
        };
        *slot = value;
        Ok(())
    }
}
