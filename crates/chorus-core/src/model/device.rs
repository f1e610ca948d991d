// ── Local media devices ──

use std::sync::Arc;

use serde::Serialize;

use chorus_sdk::{DeviceInfo, DeviceKind, EntityId};

use super::root::EntryMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceState {
    pub id: EntityId,
    pub name: String,
    pub kind: DeviceKind,
    pub is_default: bool,
}

impl From<&DeviceInfo> for DeviceState {
    fn from(info: &DeviceInfo) -> Self {
        Self {
            id: info.id.clone(),
            name: info.name.clone(),
            kind: info.kind,
            is_default: info.is_default,
        }
    }
}

/// Device section of the root state.
///
/// `sequence` is section-wide: every device-list event replaces the whole
/// list, so there is no per-device counter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceList {
    pub sequence: u64,
    pub devices: EntryMap<DeviceState>,
}

impl DeviceList {
    pub fn of_kind(&self, kind: DeviceKind) -> impl Iterator<Item = &Arc<DeviceState>> {
        self.devices.values().filter(move |d| d.kind == kind)
    }

    /// The default device of `kind`, falling back to the first one listed.
    pub fn preferred(&self, kind: DeviceKind) -> Option<&Arc<DeviceState>> {
        self.of_kind(kind)
            .find(|d| d.is_default)
            .or_else(|| self.of_kind(kind).next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: &str, kind: DeviceKind, is_default: bool) -> Arc<DeviceState> {
        Arc::new(DeviceState {
            id: EntityId::from(id),
            name: id.to_owned(),
            kind,
            is_default,
        })
    }

    #[test]
    fn preferred_falls_back_to_first_of_kind() {
        let mut list = DeviceList::default();
        for d in [
            device("cam-a", DeviceKind::Camera, false),
            device("mic-a", DeviceKind::Microphone, false),
            device("mic-b", DeviceKind::Microphone, true),
        ] {
            list.devices.insert(d.id.clone(), d);
        }

        let mic = list.preferred(DeviceKind::Microphone).map(|d| d.id.clone());
        let cam = list.preferred(DeviceKind::Camera).map(|d| d.id.clone());
        assert_eq!(mic, Some(EntityId::from("mic-b")));
        assert_eq!(cam, Some(EntityId::from("cam-a")));
        assert!(list.preferred(DeviceKind::Speaker).is_none());
    }
}
