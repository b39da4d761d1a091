mod message;

use proc_macro::TokenStream;

// ============================================================================
// #[derive(Command)] / #[derive(Event)]
// ============================================================================

/// Derive macro that declares a struct as a command contract owned by a module.
///
/// ```ignore
/// #[derive(Clone, Debug, Serialize, Deserialize, Command)]
/// #[message(module = "availability")]
/// pub struct ReserveResource {
///     pub resource_id: Uuid,
///     pub reservation_id: Uuid,
///     pub capacity: u32,
///     pub date: NaiveDate,
///     pub priority: i32,
/// }
/// ```
///
/// Generates `modular_rust::Message` (with `NAME = "reserve_resource"` and
/// `TYPE = "availability::ReserveResource"`) plus the `modular_rust::Command`
/// marker. The shape name can be overridden with `name = "..."`.
#[proc_macro_derive(Command, attributes(message))]
pub fn derive_command(input: TokenStream) -> TokenStream {
    message::derive_message(input, message::Kind::Command)
}

/// Derive macro that declares a struct as an event contract owned by a module.
///
/// Same attributes as [`derive_command`]; implements the `modular_rust::Event`
/// marker instead.
#[proc_macro_derive(Event, attributes(message))]
pub fn derive_event(input: TokenStream) -> TokenStream {
    message::derive_message(input, message::Kind::Event)
}
