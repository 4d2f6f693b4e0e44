//! Address-space reservation with shrink-retry.
//!
//! QAP graphs are sparse and irregular, so the memory a build needs is not
//! known up front. Reservation costs no physical memory, which makes it
//! cheap to ask for a generous ceiling and back off in fixed steps until the
//! host agrees.

use std::io;

use crate::error::ArenaError;
use crate::platform::VirtualMemory;
use crate::raw::VirtualRange;

/// Reserve the largest range in `ceiling, ceiling - step, ...` that is at
/// least `floor` bytes.
///
/// Returns [`ArenaError::ReservationFailed`] carrying the last platform
/// error if every size down to the floor is refused.
pub fn reserve_range<P: VirtualMemory + ?Sized>(
    platform: &P,
    ceiling: usize,
    floor: usize,
    step: usize,
) -> Result<VirtualRange, ArenaError> {
    let mut size = ceiling;
    let mut attempts = 0;
    let mut last_error = None;

    while size >= floor && size > 0 {
        attempts += 1;
        match platform.reserve(size) {
            Ok(base) => {
                log::debug!(
                    "reserved {size} bytes ({:.1} MiB) at {base:p} after {attempts} attempt(s)",
                    size as f64 / (1024.0 * 1024.0)
                );
                return Ok(VirtualRange::new(base, size));
            }
            Err(err) => {
                log::trace!("reserving {size} bytes failed: {err}");
                last_error = Some(err);
            }
        }
        if step == 0 {
            break;
        }
        size = match size.checked_sub(step) {
            Some(next) => next,
            None => break,
        };
    }

    log::error!(
        "address space reservation failed: nothing between {ceiling} and {floor} bytes \
         after {attempts} attempt(s)"
    );
    Err(ArenaError::ReservationFailed {
        ceiling,
        floor,
        attempts,
        source: last_error
            .unwrap_or_else(|| io::Error::other("no reservation size between ceiling and floor")),
    })
}
