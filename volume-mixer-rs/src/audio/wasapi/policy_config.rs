use super::com::to_wide;
use crate::audio::device::{AudioError, DeviceRole};
use windows::core::*;
use windows::Win32::System::Com::*;

/// IPolicyConfig COM interface (undocumented but stable)
/// Used to set the default audio device
#[windows::core::interface("F8679F50-850A-41CF-9C72-430F290290C8")]
pub unsafe trait IPolicyConfig: IUnknown {
    // Reserved methods to maintain vtable order
    fn reserved1(&self) -> HRESULT;
    fn reserved2(&self) -> HRESULT;
    fn reserved3(&self) -> HRESULT;
    fn reserved4(&self) -> HRESULT;
    fn reserved5(&self) -> HRESULT;
    fn reserved6(&self) -> HRESULT;
    fn reserved7(&self) -> HRESULT;
    fn reserved8(&self) -> HRESULT;
    fn reserved9(&self) -> HRESULT;
    fn reserved10(&self) -> HRESULT;

    fn SetDefaultEndpoint(&self, device_id: PCWSTR, role: u32) -> HRESULT;
}

/// Vista-era variant of the same interface, same vtable layout
#[windows::core::interface("568B9108-44BF-40B4-9006-86AFE5B5A620")]
pub unsafe trait IPolicyConfigVista: IUnknown {
    fn reserved1(&self) -> HRESULT;
    fn reserved2(&self) -> HRESULT;
    fn reserved3(&self) -> HRESULT;
    fn reserved4(&self) -> HRESULT;
    fn reserved5(&self) -> HRESULT;
    fn reserved6(&self) -> HRESULT;
    fn reserved7(&self) -> HRESULT;
    fn reserved8(&self) -> HRESULT;
    fn reserved9(&self) -> HRESULT;
    fn reserved10(&self) -> HRESULT;

    fn SetDefaultEndpoint(&self, device_id: PCWSTR, role: u32) -> HRESULT;
}

// PolicyConfigClient CLSID
const CLSID_POLICY_CONFIG_CLIENT: GUID = GUID::from_u128(0x870af99c_171d_4f9e_af0d_e63df40c2bc9);

/// Policy client, using whichever interface revision the OS exposes.
pub enum PolicyConfig {
    Current(IPolicyConfig),
    Vista(IPolicyConfigVista),
}

impl PolicyConfig {
    /// Create the policy client. COM must be initialized on this thread.
    pub fn new() -> std::result::Result<Self, AudioError> {
        unsafe {
            let client: IUnknown =
                CoCreateInstance(&CLSID_POLICY_CONFIG_CLIENT, None, CLSCTX_ALL)
                    .map_err(AudioError::SetDefaultFailed)?;

            if let Ok(policy) = client.cast::<IPolicyConfig>() {
                return Ok(Self::Current(policy));
            }
            client
                .cast::<IPolicyConfigVista>()
                .map(Self::Vista)
                .map_err(AudioError::SetDefaultFailed)
        }
    }

    /// Sets the specified device as the default for the given role
    pub fn set_default_device(
        &self,
        device_id: &str,
        role: DeviceRole,
    ) -> std::result::Result<(), AudioError> {
        let device_id_wide = to_wide(device_id);
        let device_id = PCWSTR(device_id_wide.as_ptr());

        let hr = unsafe {
            match self {
                Self::Current(policy) => policy.SetDefaultEndpoint(device_id, role as u32),
                Self::Vista(policy) => policy.SetDefaultEndpoint(device_id, role as u32),
            }
        };
        hr.ok().map_err(AudioError::SetDefaultFailed)
    }
}
