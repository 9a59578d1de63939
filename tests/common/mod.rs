#![allow(dead_code)]

use smartled_mqtt::network::error::Error;
use smartled_mqtt::network::{Close, Connection, Read, Write};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// What the mock saw, shared with the test so it survives `close(self)`.
#[derive(Debug, Default)]
pub struct MockState {
    /// Chunks returned by successive reads, front first.
    pub inbound: VecDeque<Vec<u8>>,
    /// Every buffer passed to `write`, in order.
    pub written: Vec<Vec<u8>>,
    pub flushes: usize,
    pub closed: bool,
    /// Largest number of bytes a single `write` accepts.
    pub write_limit: Option<usize>,
    pub fail_writes: bool,
}

impl MockState {
    /// All written bytes concatenated.
    pub fn written_bytes(&self) -> Vec<u8> {
        self.written.concat()
    }
}

#[derive(Debug, Clone)]
pub struct MockConnection {
    state: Rc<RefCell<MockState>>,
}

impl MockConnection {
    pub fn new() -> (Self, Rc<RefCell<MockState>>) {
        let state = Rc::new(RefCell::new(MockState::default()));
        (
            Self {
                state: state.clone(),
            },
            state,
        )
    }

    /// Creates a connection whose reads return `chunks` one at a time.
    pub fn with_inbound(chunks: &[&[u8]]) -> (Self, Rc<RefCell<MockState>>) {
        let (conn, state) = Self::new();
        for chunk in chunks {
            state.borrow_mut().inbound.push_back(chunk.to_vec());
        }
        (conn, state)
    }
}

impl Read for MockConnection {
    type Error = Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut state = self.state.borrow_mut();
        if state.closed {
            return Err(Error::ReadError);
        }
        let Some(mut chunk) = state.inbound.pop_front() else {
            // Peer went away.
            return Ok(0);
        };
        let len = buf.len().min(chunk.len());
        buf[..len].copy_from_slice(&chunk[..len]);
        if len < chunk.len() {
            let rest = chunk.split_off(len);
            state.inbound.push_front(rest);
        }
        Ok(len)
    }
}

impl Write for MockConnection {
    type Error = Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let mut state = self.state.borrow_mut();
        if state.closed || state.fail_writes {
            return Err(Error::WriteError);
        }
        let len = state.write_limit.map_or(buf.len(), |limit| buf.len().min(limit));
        state.written.push(buf[..len].to_vec());
        Ok(len)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.state.borrow_mut().flushes += 1;
        Ok(())
    }
}

impl Close for MockConnection {
    type Error = Error;

    fn close(self) -> Result<(), Self::Error> {
        self.state.borrow_mut().closed = true;
        Ok(())
    }
}

impl Connection for MockConnection {}
