//! Entity type definitions

pub mod equipment;
pub mod inspection;
pub mod report;
pub mod user;

pub use equipment::{
    Equipment, EquipmentFilter, EquipmentPatch, EquipmentSummary, EquipmentType, MaintenanceQuery,
    NewEquipment,
};
pub use inspection::{
    Inspection, InspectionDetail, InspectionFilter, InspectionKind, InspectionPatch,
    InspectionResult, InspectionStatus, NewInspection,
};
pub use report::{Report, ReportFilter};
pub use user::{NewUser, Role, User, UserFilter, UserPatch};
