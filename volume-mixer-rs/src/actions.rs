//! Button actions.
//!
//! Each action kind has its own configuration record, stored by the host as
//! a JSON blob with PascalCase keys. A blob that is missing or does not parse
//! leaves the action unconfigured and its trigger does nothing.

use crate::audio::{DataFlow, SwitchOutcome};
use crate::config::ConfigError;
use crate::service::MixerService;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// The kinds of action a button can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    SetAppVolume,
    VolumeUp,
    VolumeDown,
    MuteApp,
    SetDefaultOutput,
    SetDefaultMicrophone,
    SetDefaultDevicesPair,
    RefreshDevices,
}

impl ActionKind {
    pub const ALL: [ActionKind; 8] = [
        ActionKind::SetAppVolume,
        ActionKind::VolumeUp,
        ActionKind::VolumeDown,
        ActionKind::MuteApp,
        ActionKind::SetDefaultOutput,
        ActionKind::SetDefaultMicrophone,
        ActionKind::SetDefaultDevicesPair,
        ActionKind::RefreshDevices,
    ];

    /// Stable identifier used across the C ABI.
    pub fn id(&self) -> &'static str {
        match self {
            ActionKind::SetAppVolume => "set_app_volume",
            ActionKind::VolumeUp => "volume_up",
            ActionKind::VolumeDown => "volume_down",
            ActionKind::MuteApp => "mute_app",
            ActionKind::SetDefaultOutput => "set_default_output",
            ActionKind::SetDefaultMicrophone => "set_default_microphone",
            ActionKind::SetDefaultDevicesPair => "set_default_devices_pair",
            ActionKind::RefreshDevices => "refresh_devices",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ActionKind::SetAppVolume => "Set App Volume",
            ActionKind::VolumeUp => "Volume Up",
            ActionKind::VolumeDown => "Volume Down",
            ActionKind::MuteApp => "Mute/Unmute App",
            ActionKind::SetDefaultOutput => "Set Default Output",
            ActionKind::SetDefaultMicrophone => "Set Default Microphone",
            ActionKind::SetDefaultDevicesPair => "Set Default Output + Microphone",
            ActionKind::RefreshDevices => "Refresh Devices",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ActionKind::SetAppVolume => "Set volume for a specific application",
            ActionKind::VolumeUp => "Increase app volume",
            ActionKind::VolumeDown => "Decrease app volume",
            ActionKind::MuteApp => "Toggle mute state for an application",
            ActionKind::SetDefaultOutput => "Change the default playback device",
            ActionKind::SetDefaultMicrophone => "Change the default recording device",
            ActionKind::SetDefaultDevicesPair => {
                "Change both the default output and microphone devices at once"
            }
            ActionKind::RefreshDevices => "Refresh the device and session variables",
        }
    }

    pub fn can_configure(&self) -> bool {
        !matches!(self, ActionKind::RefreshDevices)
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionKind::ALL
            .into_iter()
            .find(|k| k.id() == s)
            .ok_or_else(|| format!("Unknown action kind: {s}"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SetAppVolumeConfig {
    pub app_name: String,
    pub volume: f32,
}

impl Default for SetAppVolumeConfig {
    fn default() -> Self {
        Self {
            app_name: String::new(),
            volume: 50.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct VolumeStepConfig {
    pub app_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MuteAppConfig {
    pub app_name: String,
}

/// A fixed device, or a pair to toggle between.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SetDefaultDeviceConfig {
    pub device_id: String,
    pub device_name: String,
    pub toggle_mode: bool,
    pub device_id2: String,
    pub device_name2: String,
    pub all_roles: bool,
}

impl Default for SetDefaultDeviceConfig {
    fn default() -> Self {
        Self {
            device_id: String::new(),
            device_name: String::new(),
            toggle_mode: false,
            device_id2: String::new(),
            device_name2: String::new(),
            all_roles: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SetDefaultDevicesPairConfig {
    pub output_device_id: String,
    pub output_device_name: String,
    pub output_toggle_mode: bool,
    pub output_device_id2: String,
    pub output_device_name2: String,
    pub input_device_id: String,
    pub input_device_name: String,
    pub input_toggle_mode: bool,
    pub input_device_id2: String,
    pub input_device_name2: String,
    pub all_roles: bool,
}

impl Default for SetDefaultDevicesPairConfig {
    fn default() -> Self {
        Self {
            output_device_id: String::new(),
            output_device_name: String::new(),
            output_toggle_mode: false,
            output_device_id2: String::new(),
            output_device_name2: String::new(),
            input_device_id: String::new(),
            input_device_name: String::new(),
            input_toggle_mode: false,
            input_device_id2: String::new(),
            input_device_name2: String::new(),
            all_roles: true,
        }
    }
}

/// One side of a device switch, borrowed from a configuration record.
#[derive(Debug, Clone, Copy)]
struct DeviceTarget<'a> {
    flow: DataFlow,
    label: &'static str,
    first: (&'a str, &'a str),
    second: (&'a str, &'a str),
    toggle: bool,
}

impl DeviceTarget<'_> {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.toggle {
            if self.first.0.is_empty() || self.second.0.is_empty() || self.first.0 == self.second.0 {
                return Err(ConfigError::ToggleNeedsTwoDevices(self.label));
            }
        } else if self.first.0.is_empty() {
            return Err(ConfigError::MissingDevice(self.label));
        }
        Ok(())
    }

    fn summary(&self) -> String {
        if self.toggle {
            format!("{} ↔ {}", self.first.1, self.second.1)
        } else {
            self.first.1.to_string()
        }
    }

    fn apply(&self, service: &MixerService, all_roles: bool) -> SwitchOutcome {
        if self.toggle {
            service.toggle_default_device(self.flow, self.first, self.second, all_roles)
        } else {
            service.switch_default_device(self.flow, self.first.0, self.first.1, all_roles)
        }
    }
}

impl SetDefaultDeviceConfig {
    fn target(&self, flow: DataFlow, label: &'static str) -> DeviceTarget<'_> {
        DeviceTarget {
            flow,
            label,
            first: (&self.device_id, &self.device_name),
            second: (&self.device_id2, &self.device_name2),
            toggle: self.toggle_mode,
        }
    }
}

impl SetDefaultDevicesPairConfig {
    fn output(&self) -> DeviceTarget<'_> {
        DeviceTarget {
            flow: DataFlow::Render,
            label: "output",
            first: (&self.output_device_id, &self.output_device_name),
            second: (&self.output_device_id2, &self.output_device_name2),
            toggle: self.output_toggle_mode,
        }
    }

    fn input(&self) -> DeviceTarget<'_> {
        DeviceTarget {
            flow: DataFlow::Capture,
            label: "microphone",
            first: (&self.input_device_id, &self.input_device_name),
            second: (&self.input_device_id2, &self.input_device_name2),
            toggle: self.input_toggle_mode,
        }
    }
}

/// A parsed, ready-to-run action.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetAppVolume(SetAppVolumeConfig),
    VolumeUp(VolumeStepConfig),
    VolumeDown(VolumeStepConfig),
    MuteApp(MuteAppConfig),
    SetDefaultOutput(SetDefaultDeviceConfig),
    SetDefaultMicrophone(SetDefaultDeviceConfig),
    SetDefaultDevicesPair(SetDefaultDevicesPairConfig),
    RefreshDevices,
}

impl Action {
    /// Parse a configuration blob for `kind`.
    pub fn from_json(kind: ActionKind, json: &str) -> Result<Self, ConfigError> {
        Ok(match kind {
            ActionKind::SetAppVolume => Action::SetAppVolume(serde_json::from_str(json)?),
            ActionKind::VolumeUp => Action::VolumeUp(serde_json::from_str(json)?),
            ActionKind::VolumeDown => Action::VolumeDown(serde_json::from_str(json)?),
            ActionKind::MuteApp => Action::MuteApp(serde_json::from_str(json)?),
            ActionKind::SetDefaultOutput => Action::SetDefaultOutput(serde_json::from_str(json)?),
            ActionKind::SetDefaultMicrophone => {
                Action::SetDefaultMicrophone(serde_json::from_str(json)?)
            }
            ActionKind::SetDefaultDevicesPair => {
                Action::SetDefaultDevicesPair(serde_json::from_str(json)?)
            }
            ActionKind::RefreshDevices => Action::RefreshDevices,
        })
    }

    /// Parse a stored blob; anything missing or malformed is `None`.
    ///
    /// Refresh Devices needs no configuration and always parses.
    pub fn parse(kind: ActionKind, json: Option<&str>) -> Option<Self> {
        if kind == ActionKind::RefreshDevices {
            return Some(Action::RefreshDevices);
        }
        let json = json.filter(|j| !j.trim().is_empty())?;
        match Self::from_json(kind, json) {
            Ok(action) => Some(action),
            Err(e) => {
                debug!("Ignoring {} configuration: {}", kind.id(), e);
                None
            }
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::SetAppVolume(_) => ActionKind::SetAppVolume,
            Action::VolumeUp(_) => ActionKind::VolumeUp,
            Action::VolumeDown(_) => ActionKind::VolumeDown,
            Action::MuteApp(_) => ActionKind::MuteApp,
            Action::SetDefaultOutput(_) => ActionKind::SetDefaultOutput,
            Action::SetDefaultMicrophone(_) => ActionKind::SetDefaultMicrophone,
            Action::SetDefaultDevicesPair(_) => ActionKind::SetDefaultDevicesPair,
            Action::RefreshDevices => ActionKind::RefreshDevices,
        }
    }

    /// The application this action needs live variables for.
    pub fn app_name(&self) -> Option<&str> {
        let name = match self {
            Action::SetAppVolume(c) => &c.app_name,
            Action::VolumeUp(c) | Action::VolumeDown(c) => &c.app_name,
            Action::MuteApp(c) => &c.app_name,
            _ => return None,
        };
        Some(name.trim()).filter(|n| !n.is_empty())
    }

    /// Checks run when the user saves the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Action::SetAppVolume(_) | Action::VolumeUp(_) | Action::VolumeDown(_) | Action::MuteApp(_) => {
                if self.app_name().is_none() {
                    return Err(ConfigError::MissingAppName);
                }
                Ok(())
            }
            Action::SetDefaultOutput(c) => c.target(DataFlow::Render, "output").validate(),
            Action::SetDefaultMicrophone(c) => c.target(DataFlow::Capture, "microphone").validate(),
            Action::SetDefaultDevicesPair(c) => {
                c.output().validate()?;
                c.input().validate()
            }
            Action::RefreshDevices => Ok(()),
        }
    }

    /// Short text shown under the button in the host's editor.
    pub fn summary(&self) -> String {
        match self {
            Action::SetAppVolume(c) => format!("{} -> {}%", c.app_name, c.volume),
            Action::VolumeUp(c) | Action::VolumeDown(c) => c.app_name.clone(),
            Action::MuteApp(c) => format!("Toggle {}", c.app_name),
            Action::SetDefaultOutput(c) | Action::SetDefaultMicrophone(c) => {
                let target = c.target(DataFlow::Render, "");
                if c.toggle_mode {
                    format!("Toggle: {}", target.summary())
                } else {
                    target.summary()
                }
            }
            Action::SetDefaultDevicesPair(c) => {
                format!("Out: {} | Mic: {}", c.output().summary(), c.input().summary())
            }
            Action::RefreshDevices => String::new(),
        }
    }

    /// Run the action. Returns whether a refresh should follow.
    pub fn execute(&self, service: &MixerService) -> bool {
        let app = self.app_name();
        match (self, app) {
            (
                Action::SetAppVolume(_) | Action::VolumeUp(_) | Action::VolumeDown(_) | Action::MuteApp(_),
                None,
            ) => {
                debug!("{} has no app configured", self.kind().id());
                return false;
            }
            (Action::SetAppVolume(c), Some(app)) => {
                service.set_app_volume(app, c.volume);
            }
            (Action::VolumeUp(_), Some(app)) => {
                service.adjust_app_volume(app, service.config().volume_step);
            }
            (Action::VolumeDown(_), Some(app)) => {
                service.adjust_app_volume(app, -service.config().volume_step);
            }
            (Action::MuteApp(_), Some(app)) => {
                service.toggle_app_mute(app);
            }
            (Action::SetDefaultOutput(c), _) => {
                c.target(DataFlow::Render, "output").apply(service, c.all_roles);
            }
            (Action::SetDefaultMicrophone(c), _) => {
                c.target(DataFlow::Capture, "microphone").apply(service, c.all_roles);
            }
            (Action::SetDefaultDevicesPair(c), _) => {
                for target in [c.output(), c.input()] {
                    if target.first.0.is_empty() && !target.toggle {
                        continue;
                    }
                    target.apply(service, c.all_roles);
                }
            }
            (Action::RefreshDevices, _) => {
                service.refresh();
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Default)]
struct InstanceState {
    configuration: Option<String>,
    tracked_app: Option<String>,
}

/// One configured button, bound to a service.
///
/// The instance remembers which app it last registered with the tracker so
/// that reconfiguration and deletion release the right reference.
pub struct ActionInstance {
    kind: ActionKind,
    service: Arc<MixerService>,
    state: Mutex<InstanceState>,
}

impl ActionInstance {
    pub fn new(service: Arc<MixerService>, kind: ActionKind, configuration: Option<String>) -> Self {
        Self {
            kind,
            service,
            state: Mutex::new(InstanceState {
                configuration,
                tracked_app: None,
            }),
        }
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn configuration(&self) -> Option<String> {
        self.lock().configuration.clone()
    }

    /// The current configuration, parsed.
    pub fn action(&self) -> Option<Action> {
        Action::parse(self.kind, self.lock().configuration.as_deref())
    }

    /// The button was loaded; start tracking its app.
    pub fn on_loaded(&self) {
        let mut state = self.lock();
        let app = Action::parse(self.kind, state.configuration.as_deref())
            .and_then(|a| a.app_name().map(str::to_string));
        self.service
            .track_app(app.as_deref(), state.tracked_app.as_deref());
        state.tracked_app = app;
    }

    /// Save a new configuration. Returns the summary to display.
    ///
    /// Rejected configurations leave the previous one in place.
    pub fn configure(&self, json: &str) -> Result<String, ConfigError> {
        let action = Action::from_json(self.kind, json)?;
        action.validate()?;

        let mut state = self.lock();
        state.configuration = Some(json.to_string());
        let app = action.app_name().map(str::to_string);
        self.service
            .track_app(app.as_deref(), state.tracked_app.as_deref());
        state.tracked_app = app;

        Ok(action.summary())
    }

    /// The button was deleted; release its app.
    pub fn on_deleted(&self) {
        let mut state = self.lock();
        if let Some(app) = state.tracked_app.take() {
            self.service.untrack_app(Some(&app));
        }
    }

    /// Run the configured action, then refresh. Unconfigured actions do nothing.
    pub fn trigger(&self) {
        let Some(action) = self.action() else {
            debug!("{} triggered without configuration", self.kind.id());
            return;
        };
        if action.execute(&self.service) {
            self.service.refresh();
        }
    }

    pub fn summary(&self) -> String {
        match self.action() {
            Some(action) if self.kind.can_configure() => action.summary(),
            Some(_) => String::new(),
            None => "Not configured".to_string(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, InstanceState> {
        self.state.lock().unwrap_or_else(|e| {
            warn!("Action state lock poisoned, recovering");
            e.into_inner()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::fake::FakeBackend;
    use crate::audio::DeviceRole;
    use crate::config::EngineConfig;
    use crate::variables::VariableValue;

    fn service(backend: FakeBackend) -> (Arc<FakeBackend>, Arc<MixerService>) {
        let backend = Arc::new(backend);
        let service = Arc::new(MixerService::with_backend(
            EngineConfig::default(),
            backend.clone(),
        ));
        (backend, service)
    }

    fn desk() -> FakeBackend {
        FakeBackend::new()
            .with_endpoint("S1", "Speakers", DataFlow::Render)
            .with_endpoint("H1", "Headphones", DataFlow::Render)
            .with_endpoint("M1", "Desk Mic", DataFlow::Capture)
            .with_endpoint("M2", "Headset Mic", DataFlow::Capture)
            .with_session("S1", 10, "Spotify", 0.5, false)
    }

    #[test]
    fn test_kind_ids_round_trip() {
        for kind in ActionKind::ALL {
            assert_eq!(kind.id().parse::<ActionKind>(), Ok(kind));
        }
        assert!("nope".parse::<ActionKind>().is_err());
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let action = Action::from_json(ActionKind::SetAppVolume, r#"{"AppName":"spotify"}"#).unwrap();
        assert_eq!(
            action,
            Action::SetAppVolume(SetAppVolumeConfig {
                app_name: "spotify".into(),
                volume: 50.0,
            })
        );

        let Action::SetDefaultOutput(config) =
            Action::from_json(ActionKind::SetDefaultOutput, r#"{"DeviceId":"S1"}"#).unwrap()
        else {
            panic!("wrong variant");
        };
        assert!(config.all_roles);
        assert!(!config.toggle_mode);
    }

    #[test]
    fn test_malformed_configuration_is_unconfigured() {
        assert!(Action::parse(ActionKind::MuteApp, None).is_none());
        assert!(Action::parse(ActionKind::MuteApp, Some("")).is_none());
        assert!(Action::parse(ActionKind::MuteApp, Some("{oops")).is_none());
        assert!(Action::parse(ActionKind::MuteApp, Some(r#"{"AppName":5}"#)).is_none());
        assert_eq!(
            Action::parse(ActionKind::RefreshDevices, None),
            Some(Action::RefreshDevices)
        );
    }

    #[test]
    fn test_validation() {
        let missing_app = Action::VolumeUp(VolumeStepConfig { app_name: " ".into() });
        assert!(matches!(missing_app.validate(), Err(ConfigError::MissingAppName)));

        let same_pair = Action::SetDefaultOutput(SetDefaultDeviceConfig {
            device_id: "S1".into(),
            toggle_mode: true,
            device_id2: "S1".into(),
            ..Default::default()
        });
        assert!(matches!(
            same_pair.validate(),
            Err(ConfigError::ToggleNeedsTwoDevices("output"))
        ));

        let no_device = Action::SetDefaultMicrophone(SetDefaultDeviceConfig::default());
        assert!(matches!(
            no_device.validate(),
            Err(ConfigError::MissingDevice("microphone"))
        ));

        let pair = Action::SetDefaultDevicesPair(SetDefaultDevicesPairConfig {
            output_device_id: "S1".into(),
            ..Default::default()
        });
        assert!(matches!(pair.validate(), Err(ConfigError::MissingDevice("microphone"))));
    }

    #[test]
    fn test_summaries() {
        let volume = Action::SetAppVolume(SetAppVolumeConfig {
            app_name: "spotify".into(),
            volume: 70.0,
        });
        assert_eq!(volume.summary(), "spotify -> 70%");

        let toggle = Action::SetDefaultOutput(SetDefaultDeviceConfig {
            device_id: "S1".into(),
            device_name: "Speakers".into(),
            toggle_mode: true,
            device_id2: "H1".into(),
            device_name2: "Headphones".into(),
            all_roles: true,
        });
        assert_eq!(toggle.summary(), "Toggle: Speakers ↔ Headphones");

        let pair = Action::SetDefaultDevicesPair(SetDefaultDevicesPairConfig {
            output_device_name: "Speakers".into(),
            input_device_name: "Desk Mic".into(),
            input_toggle_mode: true,
            input_device_name2: "Headset Mic".into(),
            ..Default::default()
        });
        assert_eq!(pair.summary(), "Out: Speakers | Mic: Desk Mic ↔ Headset Mic");

        assert_eq!(
            Action::MuteApp(MuteAppConfig { app_name: "discord".into() }).summary(),
            "Toggle discord"
        );
    }

    #[test]
    fn test_unconfigured_trigger_is_noop() {
        let (backend, service) = service(desk());
        let action = ActionInstance::new(service.clone(), ActionKind::SetAppVolume, None);

        action.trigger();
        assert_eq!(backend.session("S1", 10).volume(), 0.5);
        assert_eq!(action.summary(), "Not configured");
        assert!(service.variables().is_empty());
    }

    #[test]
    fn test_trigger_sets_volume_and_refreshes() {
        let (backend, service) = service(desk());
        let action = ActionInstance::new(
            service.clone(),
            ActionKind::SetAppVolume,
            Some(r#"{"AppName":"spotify","Volume":70}"#.into()),
        );
        action.on_loaded();

        action.trigger();
        assert!((backend.session("S1", 10).volume() - 0.7).abs() < 1e-6);
        assert_eq!(
            service.variables().get("volumemixer_app_spotify_volume"),
            Some(VariableValue::Integer(70))
        );
    }

    #[test]
    fn test_volume_step_uses_configured_step() {
        let backend = Arc::new(desk());
        let service = Arc::new(MixerService::with_backend(
            EngineConfig {
                volume_step: 10.0,
                ..Default::default()
            },
            backend.clone(),
        ));
        let up = ActionInstance::new(
            service.clone(),
            ActionKind::VolumeUp,
            Some(r#"{"AppName":"Spotify"}"#.into()),
        );
        let down = ActionInstance::new(service, ActionKind::VolumeDown, Some(r#"{"AppName":"spotify"}"#.into()));

        up.trigger();
        assert!((backend.session("S1", 10).volume() - 0.6).abs() < 1e-6);
        down.trigger();
        down.trigger();
        assert!((backend.session("S1", 10).volume() - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_mute_toggles_twice() {
        let (backend, service) = service(desk());
        let action = ActionInstance::new(service, ActionKind::MuteApp, Some(r#"{"AppName":"spotify"}"#.into()));

        action.trigger();
        assert!(backend.session("S1", 10).muted());
        action.trigger();
        assert!(!backend.session("S1", 10).muted());
    }

    #[test]
    fn test_toggle_output_between_pair() {
        let (backend, service) = service(desk());
        let action = ActionInstance::new(service, ActionKind::SetDefaultOutput, None);
        action
            .configure(
                r#"{"DeviceId":"S1","DeviceName":"Speakers","ToggleMode":true,
                    "DeviceId2":"H1","DeviceName2":"Headphones"}"#,
            )
            .unwrap();

        action.trigger();
        assert_eq!(
            backend.default_id(DataFlow::Render, DeviceRole::Multimedia).as_deref(),
            Some("H1")
        );
        action.trigger();
        assert_eq!(
            backend.default_id(DataFlow::Render, DeviceRole::Multimedia).as_deref(),
            Some("S1")
        );
    }

    #[test]
    fn test_unavailable_device_is_skipped() {
        let (backend, service) = service(desk());
        let action = ActionInstance::new(
            service,
            ActionKind::SetDefaultMicrophone,
            Some(r#"{"DeviceId":"gone","DeviceName":"USB Mic"}"#.into()),
        );

        action.trigger();
        assert!(backend.set_default_calls().is_empty());
        assert_eq!(
            backend.default_id(DataFlow::Capture, DeviceRole::Multimedia).as_deref(),
            Some("M1")
        );
    }

    #[test]
    fn test_pair_action_switches_both() {
        let (backend, service) = service(desk());
        let action = ActionInstance::new(
            service,
            ActionKind::SetDefaultDevicesPair,
            Some(r#"{"OutputDeviceId":"H1","InputDeviceId":"M2","AllRoles":false}"#.into()),
        );

        action.trigger();
        assert_eq!(
            backend.set_default_calls(),
            vec![
                ("H1".to_string(), DeviceRole::Multimedia),
                ("M2".to_string(), DeviceRole::Multimedia),
            ]
        );
        assert_eq!(
            backend.default_id(DataFlow::Render, DeviceRole::Console).as_deref(),
            Some("S1")
        );
    }

    #[test]
    fn test_configure_rejects_and_keeps_previous() {
        let (_, service) = service(desk());
        let action = ActionInstance::new(service.clone(), ActionKind::MuteApp, None);
        assert_eq!(action.configure(r#"{"AppName":"spotify"}"#).unwrap(), "Toggle spotify");

        assert!(action.configure(r#"{"AppName":""}"#).is_err());
        assert!(action.configure("garbage").is_err());
        assert_eq!(action.configuration().as_deref(), Some(r#"{"AppName":"spotify"}"#));
        assert_eq!(service.tracked_apps(), vec!["spotify".to_string()]);
    }

    #[test]
    fn test_tracking_lifecycle() {
        let (_, service) = service(desk());
        let first = ActionInstance::new(
            service.clone(),
            ActionKind::VolumeUp,
            Some(r#"{"AppName":"spotify"}"#.into()),
        );
        let second = ActionInstance::new(
            service.clone(),
            ActionKind::MuteApp,
            Some(r#"{"AppName":"Spotify"}"#.into()),
        );
        first.on_loaded();
        second.on_loaded();
        // Loading twice does not add a second reference
        first.on_loaded();

        service.refresh();
        assert!(service.variables().get("volumemixer_app_spotify_muted").is_some());

        first.configure(r#"{"AppName":"discord"}"#).unwrap();
        assert!(service.variables().get("volumemixer_app_spotify_muted").is_some());

        second.on_deleted();
        assert!(service.variables().get("volumemixer_app_spotify_muted").is_none());
        assert_eq!(service.tracked_apps(), vec!["discord".to_string()]);

        first.on_deleted();
        first.on_deleted();
        assert!(service.tracked_apps().is_empty());
    }

    #[test]
    fn test_refresh_action_publishes() {
        let (_, service) = service(desk());
        let action = ActionInstance::new(service.clone(), ActionKind::RefreshDevices, None);

        action.trigger();
        assert_eq!(
            service.variables().get("volumemixer_default_device"),
            Some("Speakers".into())
        );
        assert_eq!(action.summary(), "");
    }

    #[test]
    fn test_blank_app_name_does_not_refresh() {
        let (backend, service) = service(desk());
        let action = ActionInstance::new(
            service.clone(),
            ActionKind::VolumeUp,
            Some(r#"{"AppName":"  "}"#.into()),
        );
        action.on_loaded();

        action.trigger();
        assert!(service.variables().is_empty());
        assert_eq!(backend.enumerations(), 0);
        assert_eq!(backend.session("S1", 10).volume(), 0.5);
    }

    #[test]
    fn test_padded_app_name_is_trimmed() {
        let (backend, service) = service(desk());
        let action = ActionInstance::new(
            service.clone(),
            ActionKind::SetAppVolume,
            Some(r#"{"AppName":" spotify ","Volume":80}"#.into()),
        );
        action.on_loaded();
        assert_eq!(service.tracked_apps(), vec!["spotify".to_string()]);

        action.trigger();
        assert_eq!(backend.session("S1", 10).volume(), 0.8);
        assert_eq!(
            service.variables().get("volumemixer_app_spotify_volume"),
            Some(VariableValue::Integer(80))
        );
    }

    #[test]
    fn test_trigger_after_shutdown_changes_nothing() {
        let (backend, service) = service(desk());
        let mute = ActionInstance::new(
            service.clone(),
            ActionKind::MuteApp,
            Some(r#"{"AppName":"spotify"}"#.into()),
        );
        let output = ActionInstance::new(
            service.clone(),
            ActionKind::SetDefaultOutput,
            Some(r#"{"DeviceId":"H1","DeviceName":"Headphones"}"#.into()),
        );
        mute.on_loaded();
        service.shutdown();

        mute.trigger();
        output.trigger();
        assert!(!backend.session("S1", 10).muted());
        assert!(backend.set_default_calls().is_empty());
        assert!(service.variables().is_empty());
    }
}
