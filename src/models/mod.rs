pub mod inventory;
pub mod people;
pub mod project;
pub mod shift;
pub mod template;

pub use inventory::InventoryItem;
pub use people::{Technician, User, UserRole};
pub use project::{
    Category, DecisionOption, Financials, HoldReason, InternalNote, Invoice, InvoiceStatus,
    Media, Message, NoteKind, Part, PartStatus, Priority, Project, ProjectStatus, SubTask,
    SubTaskStatus, TimelineUpdate, Vehicle, Visibility,
};
pub use shift::{Break, BreakType, Shift};
pub use template::ProjectTemplate;
