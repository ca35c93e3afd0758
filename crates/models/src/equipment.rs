use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use std::borrow::Cow;
use validator::{Validate, ValidationError};

use crate::trim_in_place;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentType {
    Camera,
    Server,
    Switch,
    Other,
}

string_enum!(EquipmentType {
    Camera => "camera",
    Server => "server",
    Switch => "switch",
    Other => "other",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentStatus {
    #[default]
    Active,
    Maintenance,
    OutOfService,
}

string_enum!(EquipmentStatus {
    Active => "active",
    Maintenance => "maintenance",
    OutOfService => "out_of_service",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConformityStatus {
    Compliant,
    NonCompliant,
    #[default]
    Pending,
}

string_enum!(ConformityStatus {
    Compliant => "compliant",
    NonCompliant => "non_compliant",
    Pending => "pending",
});

/// A surveillance asset in the inventory (`equipements` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub equipment_type: EquipmentType,
    pub model: String,
    pub status: EquipmentStatus,
    pub latitude: f64,
    pub longitude: f64,
    pub installation_date: NaiveDate,
    pub last_maintenance: Option<NaiveDate>,
    pub conformity_status: ConformityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewEquipment {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    #[serde(rename = "type")]
    pub equipment_type: EquipmentType,

    #[validate(length(min = 1, message = "Model is required"))]
    pub model: String,

    #[serde(default)]
    pub status: EquipmentStatus,

    #[validate(custom(function = "latitude_in_range"))]
    pub latitude: f64,

    #[validate(custom(function = "longitude_in_range"))]
    pub longitude: f64,

    pub installation_date: NaiveDate,

    pub last_maintenance: Option<NaiveDate>,

    #[serde(default)]
    pub conformity_status: ConformityStatus,
}

impl NewEquipment {
    pub fn normalized(mut self) -> Self {
        trim_in_place(&mut self.name);
        trim_in_place(&mut self.model);
        self
    }
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateEquipment {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: Option<String>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub equipment_type: Option<EquipmentType>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "Model is required"))]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EquipmentStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "latitude_in_range"))]
    pub latitude: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "longitude_in_range"))]
    pub longitude: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub installation_date: Option<NaiveDate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_maintenance: Option<NaiveDate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub conformity_status: Option<ConformityStatus>,
}

impl UpdateEquipment {
    pub fn normalized(mut self) -> Self {
        if let Some(ref mut name) = self.name {
            trim_in_place(name);
        }
        if let Some(ref mut model) = self.model {
            trim_in_place(model);
        }
        self
    }
}

// `range` lets NaN through, so the bounds are checked with `contains`.
fn coordinate_in(value: f64, min: f64, max: f64, message: &'static str) -> Result<(), ValidationError> {
    if (min..=max).contains(&value) {
        return Ok(());
    }
    let mut error = ValidationError::new("range");
    error.message = Some(Cow::Borrowed(message));
    Err(error)
}

fn latitude_in_range(value: f64) -> Result<(), ValidationError> {
    coordinate_in(value, -90.0, 90.0, "Latitude must be between -90 and 90")
}

fn longitude_in_range(value: f64) -> Result<(), ValidationError> {
    coordinate_in(value, -180.0, 180.0, "Longitude must be between -180 and 180")
}
