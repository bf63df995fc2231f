//! Opaque handle registry.
//!
//! Maps the ids handed out as `SO_FILE*` to live streams. The map lock is held
//! only for lookup, insertion and removal; each stream has its own lock held
//! for one ABI call.

use std::collections::HashMap;
use std::ffi::c_void;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use sostdio_core::Stream;

pub(crate) type Handle = Arc<Mutex<Stream>>;

/// First id handed out; ids never collide with NULL.
const FIRST_STREAM_ID: usize = 0x1000_0010;

struct StreamRegistry {
    streams: HashMap<usize, Handle>,
    next_id: usize,
}

fn registry() -> &'static Mutex<StreamRegistry> {
    static REG: OnceLock<Mutex<StreamRegistry>> = OnceLock::new();
    REG.get_or_init(|| {
        Mutex::new(StreamRegistry {
            streams: HashMap::new(),
            next_id: FIRST_STREAM_ID,
        })
    })
}

/// Register `stream` and return its opaque handle.
pub(crate) fn insert(stream: Stream) -> *mut c_void {
    let mut reg = registry().lock();
    let mut id = reg.next_id;
    while id == 0 || reg.streams.contains_key(&id) {
        id = id.wrapping_add(1);
    }
    reg.next_id = id.wrapping_add(1);
    reg.streams.insert(id, Arc::new(Mutex::new(stream)));
    id as *mut c_void
}

pub(crate) fn lookup(handle: *mut c_void) -> Option<Handle> {
    registry().lock().streams.get(&(handle as usize)).cloned()
}

/// Unregister `handle`, returning the stream if no other call still holds it.
pub(crate) fn remove(handle: *mut c_void) -> Option<Result<Stream, Handle>> {
    let entry = registry().lock().streams.remove(&(handle as usize))?;
    Some(Arc::try_unwrap(entry).map(Mutex::into_inner))
}
