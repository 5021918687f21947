#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use zero_mysql_backend::error::Error;
use zero_mysql_backend::protocol::packet::frame;
use zero_mysql_backend::protocol::primitive::{write_bytes_lenenc, write_int_lenenc};
use zero_mysql_backend::{BackendConnection, LoadDataResponseHandler, ResponseHandler};

/// Send decoder logs to the test output
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Ok(Bytes),
    Err(Bytes),
    RequestData(Bytes),
    FieldEof {
        header: Bytes,
        fields: Vec<Bytes>,
        eof: Bytes,
    },
    Row(Bytes),
    RowEof(Bytes),
    ConnectionError(String),
}

/// Records every event it receives, together with the connection id
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<(u64, Event)>>,
    pub load_data: bool,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A recorder that also answers LOCAL INFILE requests
    pub fn load_data() -> Arc<Self> {
        Arc::new(Self {
            load_data: true,
            ..Default::default()
        })
    }

    fn push(&self, conn: &dyn BackendConnection, event: Event) {
        self.events.lock().unwrap().push((conn.id(), event));
    }

    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub fn events_with_conn(&self) -> Vec<(u64, Event)> {
        self.events.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    /// Wait until `count` events arrived, or give up after a few seconds
    pub async fn wait_for(&self, count: usize) {
        for _ in 0..500 {
            if self.len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {count} events, got {:?}", self.events());
    }
}

impl ResponseHandler for Recorder {
    fn ok_response(&self, ok: &Bytes, conn: &dyn BackendConnection) {
        self.push(conn, Event::Ok(ok.clone()));
    }

    fn error_response(&self, err: &Bytes, conn: &dyn BackendConnection) {
        self.push(conn, Event::Err(err.clone()));
    }

    fn field_eof_response(
        &self,
        header: &Bytes,
        fields: &[Bytes],
        eof: &Bytes,
        conn: &dyn BackendConnection,
    ) {
        self.push(
            conn,
            Event::FieldEof {
                header: header.clone(),
                fields: fields.to_vec(),
                eof: eof.clone(),
            },
        );
    }

    fn row_response(&self, row: &Bytes, conn: &dyn BackendConnection) {
        self.push(conn, Event::Row(row.clone()));
    }

    fn row_eof_response(&self, eof: &Bytes, conn: &dyn BackendConnection) {
        self.push(conn, Event::RowEof(eof.clone()));
    }

    fn connection_error(&self, cause: &Error, conn: &dyn BackendConnection) {
        self.push(conn, Event::ConnectionError(cause.to_string()));
    }

    fn as_load_data(&self) -> Option<&dyn LoadDataResponseHandler> {
        if self.load_data { Some(self) } else { None }
    }
}

impl LoadDataResponseHandler for Recorder {
    fn request_data_response(&self, request: &Bytes, conn: &dyn BackendConnection) {
        self.push(conn, Event::RequestData(request.clone()));
    }
}

#[derive(Default)]
pub struct MockConn {
    pub id: u64,
    closed: AtomicBool,
    closes: AtomicU64,
    reasons: Mutex<Vec<String>>,
}

impl MockConn {
    pub fn new(id: u64) -> Arc<Self> {
        Arc::new(Self {
            id,
            ..Default::default()
        })
    }

    pub fn reasons(&self) -> Vec<String> {
        self.reasons.lock().unwrap().clone()
    }

    pub fn close_count(&self) -> u64 {
        self.closes.load(Ordering::Acquire)
    }
}

impl BackendConnection for MockConn {
    fn id(&self) -> u64 {
        self.id
    }

    fn is_closed_or_quit(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn close(&self, reason: &str) {
        self.closed.store(true, Ordering::Release);
        self.closes.fetch_add(1, Ordering::AcqRel);
        self.reasons.lock().unwrap().push(reason.to_string());
    }
}

pub fn ok(sequence_id: u8) -> Bytes {
    frame(sequence_id, &[0x00, 0x01, 0x00, 0x02, 0x00, 0x00, 0x00])
}

pub fn err(sequence_id: u8) -> Bytes {
    frame(sequence_id, b"\xff\x15\x04#28000Access denied")
}

pub fn eof(sequence_id: u8) -> Bytes {
    frame(sequence_id, &[0xFE, 0x00, 0x00, 0x22, 0x00])
}

/// A zero count is written in its 3-byte form, since a single `0x00` is OK
pub fn header(column_count: u64) -> Bytes {
    let mut payload = Vec::new();
    if column_count == 0 {
        payload.extend_from_slice(&[0xFC, 0x00, 0x00]);
    } else {
        write_int_lenenc(&mut payload, column_count);
    }
    frame(1, &payload)
}

pub fn field(sequence_id: u8, name: &str) -> Bytes {
    let mut payload = Vec::new();
    for part in ["def", "shop", "orders", "orders", name, name] {
        write_bytes_lenenc(&mut payload, part.as_bytes());
    }
    payload.push(0x0c);
    payload.extend_from_slice(&[0x3f, 0x00, 0x0b, 0, 0, 0, 0x03, 0x03, 0x42, 0, 0, 0]);
    frame(sequence_id, &payload)
}

pub fn row(sequence_id: u8, values: &[&str]) -> Bytes {
    let mut payload = Vec::new();
    for value in values {
        write_bytes_lenenc(&mut payload, value.as_bytes());
    }
    frame(sequence_id, &payload)
}

/// header(2) -> A -> B -> EOF -> R1 -> R2 -> EOF
pub fn two_column_result_set() -> Vec<Bytes> {
    vec![
        header(2),
        field(2, "id"),
        field(3, "total"),
        eof(4),
        row(5, &["1", "9.50"]),
        row(6, &["2", "12.00"]),
        eof(7),
    ]
}

pub fn two_column_events() -> Vec<Event> {
    vec![
        Event::FieldEof {
            header: header(2),
            fields: vec![field(2, "id"), field(3, "total")],
            eof: eof(4),
        },
        Event::Row(row(5, &["1", "9.50"])),
        Event::Row(row(6, &["2", "12.00"])),
        Event::RowEof(eof(7)),
    ]
}
