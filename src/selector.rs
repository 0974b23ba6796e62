use crate::domain::DeviceRecord;

/// which device the widget shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCriterion {
    ById(String),
    ByName(String),
    /// neither id nor name configured - nothing ever matches
    Unset,
}

impl DeviceCriterion {
    /// id wins when both are set; empty strings count as unset
    pub fn from_parts(id: &str, name: &str) -> Self {
        if !id.is_empty() {
            Self::ById(id.to_string())
        } else if !name.is_empty() {
            Self::ByName(name.to_string())
        } else {
            Self::Unset
        }
    }
}

/// first device matching the criterion, in api order
pub fn select_device<'a>(
    devices: &'a [DeviceRecord],
    criterion: &DeviceCriterion,
) -> Option<&'a DeviceRecord> {
    match criterion {
        DeviceCriterion::ById(id) => devices.iter().find(|d| &d.id == id),
        DeviceCriterion::ByName(name) => devices.iter().find(|d| &d.name == name),
        DeviceCriterion::Unset => None,
    }
}
