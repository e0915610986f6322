//! # TCP Connection
//!
//! Blocking RESP2 connection used by [`KvClient`](crate::KvClient). Any IO or
//! framing failure drops the socket, so the pool sees the connection as
//! not-connected and reconnects it the next time it leaves the idle queue.

use std::io::{self, BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};

use bytes::BytesMut;

use crate::config::{Endpoint, TcpOptions};
use crate::connection::Connection;
use crate::error::{ClientError, ClientResult};
use crate::resp::{encode_command, read_reply, Reply};

/// Single TCP connection with reusable buffers.
pub struct TcpConnection {
    options: TcpOptions,
    // Buffered reader reduces syscalls while still allowing direct writes.
    reader: Option<BufReader<TcpStream>>,
    line_buf: Vec<u8>,
    write_buf: BytesMut,
}

impl TcpConnection {
    /// Sends one command and waits for its reply.
    pub fn execute(&mut self, args: &[&[u8]]) -> ClientResult<Reply> {
        let reader = self.reader.as_mut().ok_or(ClientError::NotConnected)?;

        self.write_buf.clear();
        encode_command(args, &mut self.write_buf);

        let result = send(reader, &self.write_buf).and_then(|()| read_reply(reader, &mut self.line_buf));
        if result.is_err() {
            // The stream may hold half a reply; it cannot be reused.
            self.reader = None;
        }
        result
    }

    /// Address of the connected peer, if any.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.reader.as_ref().and_then(|reader| reader.get_ref().peer_addr().ok())
    }
}

impl Connection for TcpConnection {
    type Options = TcpOptions;

    fn new(options: TcpOptions) -> Self {
        TcpConnection {
            options,
            reader: None,
            line_buf: Vec::with_capacity(128),
            write_buf: BytesMut::with_capacity(256),
        }
    }

    fn connect(&mut self, endpoint: &Endpoint) -> ClientResult<()> {
        self.reader = None;
        let stream = connect_stream(endpoint, &self.options)?;
        stream.set_read_timeout(self.options.read_timeout)?;
        stream.set_write_timeout(self.options.write_timeout)?;
        stream.set_nodelay(self.options.nodelay)?;
        self.reader = Some(BufReader::new(stream));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.reader.is_some()
    }

    fn close(&mut self) -> ClientResult<()> {
        let Some(reader) = self.reader.take() else {
            return Ok(());
        };
        match reader.get_ref().shutdown(Shutdown::Both) {
            Err(err) if err.kind() != io::ErrorKind::NotConnected => Err(err.into()),
            _ => Ok(()),
        }
    }
}

fn send(reader: &mut BufReader<TcpStream>, frame: &[u8]) -> ClientResult<()> {
    let stream = reader.get_mut();
    stream.write_all(frame)?;
    stream.flush()?;
    Ok(())
}

fn connect_stream(endpoint: &Endpoint, options: &TcpOptions) -> ClientResult<TcpStream> {
    let addrs = (endpoint.host.as_str(), endpoint.port)
        .to_socket_addrs()
        .map_err(|_| ClientError::InvalidAddress(endpoint.to_string()))?;

    let mut last_err = None;
    for addr in addrs {
        let attempt = match options.connect_timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }

    match last_err {
        Some(err) => Err(err.into()),
        None => Err(ClientError::InvalidAddress(endpoint.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn unresolvable_host_is_invalid_address() {
        let mut conn = TcpConnection::new(TcpOptions::default());
        let err = conn
            .connect(&Endpoint::new("not a host name", 6379))
            .expect_err("should not resolve");
        assert!(matches!(err, ClientError::InvalidAddress(_)));
        assert!(!conn.is_connected());
    }

    #[test]
    fn execute_requires_connection() {
        let mut conn = TcpConnection::new(TcpOptions::default());
        assert!(matches!(conn.execute(&[b"PING"]), Err(ClientError::NotConnected)));
        conn.close().expect("closing an unconnected socket is a no-op");
    }

    #[test]
    fn connect_and_close_toggle_liveness() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();

        let mut conn = TcpConnection::new(TcpOptions::default());
        conn.connect(&Endpoint::new("127.0.0.1", port)).expect("connect");
        assert!(conn.is_connected());
        assert_eq!(conn.peer_addr().map(|addr| addr.port()), Some(port));

        conn.close().expect("close");
        assert!(!conn.is_connected());
    }
}
