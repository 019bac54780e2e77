// # Record Dispatcher
//
// One listing surface for every record family. A `ResourceConfig` names the
// endpoint, columns and fields; its `ResourceKind` picks the create/edit modal,
// the row projection and the delete request.

pub mod listing;
pub mod modal;
pub mod resource;
pub mod table;

pub use listing::{ListingController, ListingState};
pub use modal::{CreateSurface, FieldFormModal, LinkFormModal, RecordModal};
pub use resource::{
    DeleteTarget, FieldDescriptor, FieldKind, ResourceConfig, ResourceKind, Row,
};
pub use table::{
    DispatchError, EditAction, PaginationView, RecordDispatcher, RowCapabilities, RowView,
    TableView,
};
