//! Applies server-advertised endpoint options to the endpoint state.
//!
//! The rules are small but exact:
//! * **every** option matching the target id is processed, in order — later
//!   matches overwrite earlier ones per field, and fields are not coupled
//!   across options;
//! * dedicated media endpoints survive only for the data centers in
//!   [`DEDICATED_MEDIA_DCS`], and only in production — everywhere else the
//!   media fields are forced to mirror the server fields after the loop.

use crate::store::{EndpointState, Field};
use rehome_tl::types::DcOption;

/// Data centers that keep dedicated media endpoints in production.
///
/// The boundary is a server-side convention; it is kept here as a literal
/// table rather than derived from anything.
pub const DEDICATED_MEDIA_DCS: [i32; 2] = [2, 4];

/// Rewrite `state`'s address fields from `options`, keeping only the options
/// whose `id` matches `target_dc_id`. Returns the fields written, in order —
/// the caller persists each one through the storage boundary.
///
/// `test_mode` is read from the state itself. Pure: no I/O happens here.
pub fn apply_dc_options(
    state: &mut EndpointState,
    target_dc_id: i32,
    options: &[DcOption],
) -> Vec<Field> {
    let mut writes = Vec::new();

    for opt in options.iter().filter(|o| o.id == target_dc_id) {
        let addr = Some(opt.ip_address.clone());
        match (opt.media_only, opt.ipv6) {
            (true, true) => {
                state.media_address_v6 = addr;
                writes.push(Field::MediaAddressV6);
            }
            (true, false) => {
                state.media_address = addr;
                writes.push(Field::MediaAddress);
            }
            (false, true) => {
                state.server_address_v6 = addr;
                writes.push(Field::ServerAddressV6);
            }
            (false, false) => {
                state.server_address = addr;
                writes.push(Field::ServerAddress);
            }
        }
        // The wire field is i32; a value outside 0..=65535 is a malformed
        // option and the port write is skipped rather than wrapped.
        if opt.this_port_only {
            match u16::try_from(opt.port) {
                Ok(port) if opt.media_only => {
                    state.media_port = Some(port);
                    writes.push(Field::MediaPort);
                }
                Ok(port) => {
                    state.server_port = Some(port);
                    writes.push(Field::ServerPort);
                }
                Err(_) => {}
            }
        }
    }

    if !DEDICATED_MEDIA_DCS.contains(&target_dc_id) || state.test_mode {
        state.media_address = state.server_address.clone();
        writes.push(Field::MediaAddress);
        state.media_address_v6 = state.server_address_v6.clone();
        writes.push(Field::MediaAddressV6);
        state.media_port = state.server_port;
        writes.push(Field::MediaPort);
    }

    writes
}
