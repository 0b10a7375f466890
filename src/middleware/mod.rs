mod trace_id;

pub use trace_id::{TRACE_ID_HEADER, TraceId, trace_id_middleware};
