//! Local request router.
//!
//! In-process request/response between modules, addressed by path
//! (`"availability/resources/add"`). The receiving module declares its own
//! request type; payloads cross the boundary as JSON and are decoded
//! structurally, so neither side references the other's types.
//!
//! ```ignore
//! // availability module, during activation
//! pipeline.route("availability/resources/add", |cmd: AddResource, scope, _| async move {
//!     scope.require::<ResourcesRepository>()?.add(cmd.resource_id, cmd.capacity)?;
//!     Ok(())
//! })?;
//!
//! // parking spots module
//! client.send("availability/resources/add", &request, &cancel).await?;
//! ```

mod client;
mod error;
mod registry;

pub use client::ModuleClient;
pub use error::RequestError;
pub use registry::{RouteTable, RouteTableBuilder};
