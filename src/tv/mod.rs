use crate::color::zones::ZoneModel;
use crate::error::AmbiError;

pub mod client;
pub mod protocol;

/// Something the dispatch loop can wait on and sample zone colors from.
pub trait AmbilightSource {
    /// Resolves once the device is up, or fails with
    /// [`AmbiError::DeviceUnreachable`].
    async fn wait_for_startup(&mut self) -> Result<(), AmbiError>;

    /// Fetches one sample and rebuilds the zone model from it.
    async fn poll(&mut self) -> Result<ZoneModel, AmbiError>;

    /// Releases the connection.
    fn close(self);
}
