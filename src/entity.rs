//! Static description of each list page: endpoints, columns, paging and capabilities.

use crate::model::{GroupingKey, RecordId};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Registrations,
    Participants,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub id: &'static str,
    pub header: &'static str,
    pub sortable: bool,
    pub hideable: bool,
}

const fn col(id: &'static str, header: &'static str, sortable: bool) -> Column {
    Column {
        id,
        header,
        sortable,
        hideable: true,
    }
}

const REGISTRATION_COLUMNS: &[Column] = &[
    col("fair_id", "Fair Id", false),
    col("fair_firm_name", "Firm Name", true),
    col("fair_person_name", "Name", false),
    col("fair_person_mobile", "Mobile", false),
    col("fair_print_status", "Status", false),
];

const PARTICIPANT_COLUMNS: &[Column] = &[
    col("id", "ID", false),
    col("name_of_firm", "Firm Name", true),
    col("brand_name", "Brand", false),
    col("manufacturer_name", "Manufacturer", false),
    col("rep1_mobile", "Mobile", false),
    col("profile_status", "Status", false),
];

/// Screens owned by the web panel that a row action can point at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    View(RecordId),
    Edit(RecordId),
    Create,
}

impl EntityKind {
    /// Name used as the first component of cache keys.
    pub fn collection(self) -> &'static str {
        match self {
            EntityKind::Registrations => "registrations",
            EntityKind::Participants => "participants",
        }
    }

    pub fn detail_collection(self) -> &'static str {
        match self {
            EntityKind::Registrations => "registration-detail",
            EntityKind::Participants => "participant-detail",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            EntityKind::Registrations => "Registrations List",
            EntityKind::Participants => "Participants List",
        }
    }

    pub fn columns(self) -> &'static [Column] {
        match self {
            EntityKind::Registrations => REGISTRATION_COLUMNS,
            EntityKind::Participants => PARTICIPANT_COLUMNS,
        }
    }

    pub fn page_size(self) -> usize {
        match self {
            EntityKind::Registrations => 100,
            EntityKind::Participants => 7,
        }
    }

    pub fn default_grouping(self) -> Option<GroupingKey> {
        match self {
            EntityKind::Registrations => None,
            EntityKind::Participants => Some(GroupingKey("30".into())),
        }
    }

    /// Column holding the cycling lifecycle status, if the entity has one.
    pub fn status_field(self) -> Option<&'static str> {
        match self {
            EntityKind::Registrations => None,
            EntityKind::Participants => Some("profile_status"),
        }
    }

    pub fn print_status_field(self) -> Option<&'static str> {
        match self {
            EntityKind::Registrations => Some("fair_print_status"),
            EntityKind::Participants => None,
        }
    }

    pub fn supports_groupings(self) -> bool {
        matches!(self, EntityKind::Participants)
    }

    pub fn supports_printing(self) -> bool {
        self.print_status_field().is_some()
    }

    pub fn supports_delete(self) -> bool {
        matches!(self, EntityKind::Participants)
    }

    /// JSON key the panel API wraps list and detail payloads in.
    pub fn envelope(self) -> &'static str {
        match self {
            EntityKind::Registrations => "registerData",
            EntityKind::Participants => "participant",
        }
    }

    pub fn list_path(self, grouping: Option<&GroupingKey>) -> String {
        match (self, grouping) {
            (EntityKind::Registrations, _) => "/api/panel-fetch-register".into(),
            (EntityKind::Participants, Some(g)) => {
                format!("/api/panel-fetch-participant-list/{g}")
            }
            (EntityKind::Participants, None) => "/api/panel-fetch-participant-list".into(),
        }
    }

    pub fn detail_path(self, id: &RecordId) -> String {
        match self {
            EntityKind::Registrations => format!("/api/panel-fetch-register-by-id/{id}"),
            EntityKind::Participants => format!("/api/panel-fetch-participant-by-id/{id}"),
        }
    }

    pub fn status_path(self, id: &RecordId) -> Option<String> {
        match self {
            EntityKind::Registrations => None,
            EntityKind::Participants => {
                Some(format!("/api/panel-update-participant-status/{id}"))
            }
        }
    }

    pub fn delete_path(self, id: &RecordId) -> Option<String> {
        match self {
            EntityKind::Registrations => None,
            EntityKind::Participants => Some(format!("/api/panel-delete-participant/{id}")),
        }
    }

    pub fn groupings_path(self) -> Option<&'static str> {
        match self {
            EntityKind::Registrations => None,
            EntityKind::Participants => Some("/api/panel-fetch-participantGroup"),
        }
    }

    pub fn route(self, route: &Route) -> String {
        let noun = match self {
            EntityKind::Registrations => "registration",
            EntityKind::Participants => "participants",
        };
        match route {
            Route::View(id) => format!("/view-{noun}/{id}"),
            Route::Edit(id) => format!("/edit-{noun}/{id}"),
            Route::Create => format!("/create-{noun}"),
        }
    }
}
