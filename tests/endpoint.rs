//! End-to-end tests of the endpoint against the in-memory transport.

use draftws::protocol::handshake::ClientRequest;
use draftws::{
    ChannelState, Config, ConnectionId, Draft, Endpoint, MemoryTransport, Message, OpCode,
    ReadHandler, SeededRandom,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Accepted(ConnectionId),
    Read(ConnectionId, Vec<u8>, Option<OpCode>),
    Closed(ConnectionId),
}

#[derive(Debug, Default)]
struct Recorder {
    events: Vec<Event>,
}

impl Recorder {
    fn reads(&self) -> Vec<(Vec<u8>, Option<OpCode>)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Read(_, payload, opcode) => Some((payload.clone(), *opcode)),
                _ => None,
            })
            .collect()
    }

    fn count_accepted(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, Event::Accepted(_)))
            .count()
    }

    fn count_closed(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, Event::Closed(_)))
            .count()
    }
}

impl ReadHandler for Recorder {
    fn accepted(&mut self, id: ConnectionId) {
        self.events.push(Event::Accepted(id));
    }

    fn read(&mut self, id: ConnectionId, payload: &[u8], opcode: Option<OpCode>) {
        self.events.push(Event::Read(id, payload.to_vec(), opcode));
    }

    fn closed(&mut self, id: ConnectionId) {
        self.events.push(Event::Closed(id));
    }
}

fn server(config: Config) -> Endpoint<SeededRandom> {
    Endpoint::with_random(config, SeededRandom::new(0x5e))
}

const D07_REQUEST: &[u8] = b"GET /chat HTTP/1.1\r\n\
    Host: server.example.com\r\n\
    Upgrade: websocket\r\n\
    Connection: Upgrade\r\n\
    Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
    Sec-WebSocket-Version: 13\r\n\
    \r\n";

const D76_HEAD: &[u8] = b"GET /demo HTTP/1.1\r\n\
    Host: example.com\r\n\
    Connection: Upgrade\r\n\
    Sec-WebSocket-Key2: 12998 5 Y3 1  .P00\r\n\
    Upgrade: WebSocket\r\n\
    Sec-WebSocket-Key1: 4 @1  46546xW%0l 1 5\r\n\
    Origin: http://example.com\r\n\
    \r\n";

const D75_REQUEST: &[u8] = b"GET /demo HTTP/1.1\r\n\
    Upgrade: WebSocket\r\n\
    Connection: Upgrade\r\n\
    Host: example.com\r\n\
    Origin: http://example.com\r\n\
    \r\n";

/// RFC 6455 section 5.7: masked "Hello".
const MASKED_HELLO: &[u8] = &[
    0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58,
];

#[test]
fn test_d07_server_handshake_and_frame() {
    let mut ep = server(Config::default());
    let mut transport = MemoryTransport::new();
    let mut rec = Recorder::default();
    let id = ep.accept();

    transport.push_inbound(id, D07_REQUEST);
    transport.push_inbound(id, MASKED_HELLO);
    ep.on_readable(id, &mut transport, &mut rec).unwrap();

    assert_eq!(
        &transport.take_outbound(id)[..],
        &b"HTTP/1.1 101 Switching Protocols\r\n\
           Upgrade: websocket\r\n\
           Connection: Upgrade\r\n\
           Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n\
           \r\n"[..]
    );
    assert_eq!(ep.state(id), Some(ChannelState::Established));
    assert_eq!(ep.draft(id), Some(Draft::RFC6455));
    assert_eq!(
        rec.events,
        vec![
            Event::Accepted(id),
            Event::Read(id, b"Hello".to_vec(), Some(OpCode::Text)),
        ]
    );
}

#[test]
fn test_d76_two_phase_read() {
    let mut ep = server(Config::default());
    let mut transport = MemoryTransport::new();
    let mut rec = Recorder::default();
    let id = ep.accept();

    transport.push_inbound(id, D76_HEAD);
    transport.push_inbound(id, b"^n:d");
    ep.on_readable(id, &mut transport, &mut rec).unwrap();
    assert_eq!(ep.state(id), Some(ChannelState::AwaitingHandshake));
    assert_eq!(ep.draft(id), Some(Draft::D76));
    assert!(transport.take_outbound(id).is_empty());
    assert_eq!(rec.count_accepted(), 0);

    transport.push_inbound(id, b"s[4U\x00hello\xff");
    ep.on_readable(id, &mut transport, &mut rec).unwrap();
    let response = transport.take_outbound(id);
    assert!(response.starts_with(b"HTTP/1.1 101 WebSocket Protocol Handshake\r\n"));
    assert!(response.ends_with(b"\r\n\r\n8jKS'y:G*Co,Wxa-"));
    assert_eq!(ep.context(id).unwrap().body(), b"^n:ds[4U");
    assert_eq!(rec.reads(), vec![(b"hello".to_vec(), None)]);
}

#[test]
fn test_d75_server_many_frames_per_read() {
    let mut ep = server(Config::default());
    let mut transport = MemoryTransport::new();
    let mut rec = Recorder::default();
    let id = ep.accept();

    transport.push_inbound(id, D75_REQUEST);
    transport.push_inbound(id, b"\x00a\xff\x00bc\xff\x00\xff\x00tail");
    ep.on_readable(id, &mut transport, &mut rec).unwrap();

    let response = transport.take_outbound(id);
    assert!(response.starts_with(b"HTTP/1.1 101 Web Socket Protocol Handshake\r\n"));
    assert!(
        response
            .windows(b"WebSocket-Location: ws://example.com/demo".len())
            .any(|w| w == b"WebSocket-Location: ws://example.com/demo")
    );
    assert_eq!(
        rec.reads(),
        vec![(b"a".to_vec(), None), (b"bc".to_vec(), None), (Vec::new(), None)]
    );

    transport.push_inbound(id, b"\xff");
    ep.on_readable(id, &mut transport, &mut rec).unwrap();
    assert_eq!(rec.reads().last(), Some(&(b"tail".to_vec(), None)));
}

#[test]
fn test_one_byte_reads() {
    let mut ep = server(Config::default().with_read_buffer_size(1));
    let mut transport = MemoryTransport::new().with_chunk_size(1);
    let mut rec = Recorder::default();
    let id = ep.accept();

    transport.push_inbound(id, D76_HEAD);
    transport.push_inbound(id, b"^n:ds[4U\x00x\xff");
    ep.on_readable(id, &mut transport, &mut rec).unwrap();
    assert_eq!(ep.state(id), Some(ChannelState::Established));
    assert_eq!(rec.reads(), vec![(b"x".to_vec(), None)]);
}

#[test]
fn test_unsupported_version_closes_without_response() {
    let mut ep = server(Config::default());
    let mut transport = MemoryTransport::new();
    let mut rec = Recorder::default();
    let id = ep.accept();

    transport.push_inbound(
        id,
        b"GET / HTTP/1.1\r\nHost: a\r\nSec-WebSocket-Key: x\r\nSec-WebSocket-Version: 99\r\n\r\n",
    );
    ep.on_readable(id, &mut transport, &mut rec).unwrap();

    assert!(transport.take_outbound(id).is_empty());
    assert!(transport.is_closed(id));
    assert_eq!(ep.state(id), None);
    assert_eq!(rec.events, vec![Event::Closed(id)]);
}

#[test]
fn test_unmasked_frame_closes_without_read() {
    let mut ep = server(Config::default());
    let mut transport = MemoryTransport::new();
    let mut rec = Recorder::default();
    let id = ep.accept();

    transport.push_inbound(id, D07_REQUEST);
    transport.push_inbound(id, &[0x81, 0x05, b'H', b'e', b'l', b'l', b'o']);
    ep.on_readable(id, &mut transport, &mut rec).unwrap();

    assert!(rec.reads().is_empty());
    assert_eq!(rec.count_closed(), 1);
    assert!(transport.is_closed(id));
    assert!(ep.is_empty());
}

#[test]
fn test_refused_origin() {
    let config = Config::default().with_allowed_origins(vec!["https://trusted.example".into()]);
    let mut ep = server(config);
    let mut transport = MemoryTransport::new();
    let mut rec = Recorder::default();
    let id = ep.accept();

    transport.push_inbound(id, D75_REQUEST);
    ep.on_readable(id, &mut transport, &mut rec).unwrap();
    assert!(transport.take_outbound(id).is_empty());
    assert_eq!(rec.events, vec![Event::Closed(id)]);
}

#[test]
fn test_ping_is_answered() {
    let mut ep = server(Config::default());
    let mut transport = MemoryTransport::new();
    let mut rec = Recorder::default();
    let id = ep.accept();

    transport.push_inbound(id, D07_REQUEST);
    ep.on_readable(id, &mut transport, &mut rec).unwrap();
    transport.take_outbound(id);

    // Masked ping with payload "hi", key 00 00 00 00.
    transport.push_inbound(id, &[0x89, 0x82, 0, 0, 0, 0, b'h', b'i']);
    ep.on_readable(id, &mut transport, &mut rec).unwrap();
    assert_eq!(&transport.take_outbound(id)[..], &[0x8A, 0x02, b'h', b'i']);
    assert_eq!(rec.reads(), vec![(b"hi".to_vec(), Some(OpCode::Ping))]);
}

/// A client endpoint and a server endpoint joined by two memory transports.
struct Loopback {
    client: Endpoint<SeededRandom>,
    server: Endpoint<SeededRandom>,
    client_io: MemoryTransport,
    server_io: MemoryTransport,
    client_rec: Recorder,
    server_rec: Recorder,
    cid: ConnectionId,
    sid: ConnectionId,
}

impl Loopback {
    fn open(draft: Draft) -> Self {
        let mut client = Endpoint::with_random(Config::default(), SeededRandom::new(1));
        let mut server = Endpoint::with_random(Config::default(), SeededRandom::new(2));
        let request = ClientRequest::new(draft, "example.com", "/room").with_origin("http://example.com");
        let cid = client.connect(&request).unwrap();
        let sid = server.accept();
        let mut lb = Self {
            client,
            server,
            client_io: MemoryTransport::new(),
            server_io: MemoryTransport::new(),
            client_rec: Recorder::default(),
            server_rec: Recorder::default(),
            cid,
            sid,
        };
        lb.pump();
        lb
    }

    /// Move bytes both ways until neither side has anything to say.
    fn pump(&mut self) {
        for _ in 0..4 {
            if self.client.state(self.cid).is_some() {
                self.client
                    .on_writable(self.cid, &mut self.client_io, &mut self.client_rec)
                    .unwrap();
            }
            let up = self.client_io.take_outbound(self.cid);
            if !up.is_empty() && self.server.state(self.sid).is_some() {
                self.server_io.push_inbound(self.sid, &up);
                self.server
                    .on_readable(self.sid, &mut self.server_io, &mut self.server_rec)
                    .unwrap();
            }
            if self.server.state(self.sid).is_some() {
                self.server
                    .on_writable(self.sid, &mut self.server_io, &mut self.server_rec)
                    .unwrap();
            }
            let down = self.server_io.take_outbound(self.sid);
            if !down.is_empty() && self.client.state(self.cid).is_some() {
                self.client_io.push_inbound(self.cid, &down);
                self.client
                    .on_readable(self.cid, &mut self.client_io, &mut self.client_rec)
                    .unwrap();
            }
        }
    }
}

#[test]
fn test_loopback_every_draft() {
    for (draft, opcode) in [
        (Draft::D75, None),
        (Draft::D76, None),
        (Draft::D07Plus { version: 8 }, Some(OpCode::Text)),
        (Draft::RFC6455, Some(OpCode::Text)),
    ] {
        let mut lb = Loopback::open(draft);
        assert_eq!(lb.client.state(lb.cid), Some(ChannelState::Established), "{draft}");
        assert_eq!(lb.server.state(lb.sid), Some(ChannelState::Established), "{draft}");
        assert_eq!(lb.server.draft(lb.sid), Some(draft));
        assert_eq!(lb.client_rec.count_accepted(), 1);
        assert_eq!(lb.server_rec.count_accepted(), 1);

        lb.client.send(lb.cid, Message::text("up")).unwrap();
        lb.server.send(lb.sid, Message::text("down")).unwrap();
        lb.pump();

        assert_eq!(lb.server_rec.reads(), vec![(b"up".to_vec(), opcode)], "{draft}");
        assert_eq!(lb.client_rec.reads(), vec![(b"down".to_vec(), opcode)], "{draft}");
    }
}

#[test]
fn test_d76_closing_handshake() {
    let mut lb = Loopback::open(Draft::D76);
    lb.client
        .close(lb.cid, &mut lb.client_io, &mut lb.client_rec)
        .unwrap();
    assert_eq!(lb.client_rec.count_closed(), 1);

    let wire = lb.client_io.take_outbound(lb.cid);
    assert_eq!(&wire[..], &[0xFF, 0x00]);
    lb.server_io.push_inbound(lb.sid, &wire);
    lb.server
        .on_readable(lb.sid, &mut lb.server_io, &mut lb.server_rec)
        .unwrap();

    assert_eq!(&lb.server_io.take_outbound(lb.sid)[..], &[0xFF, 0x00]);
    assert_eq!(lb.server_rec.count_closed(), 1);
    assert!(lb.server_io.is_closed(lb.sid));
}

#[test]
fn test_rfc6455_close_is_echoed() {
    let mut lb = Loopback::open(Draft::RFC6455);
    lb.client.send(lb.cid, Message::close(1001, "bye")).unwrap();
    lb.pump();

    assert_eq!(lb.client.state(lb.cid), None);
    assert_eq!(lb.server.state(lb.sid), None);
    let close = lb.server_rec.reads();
    assert_eq!(close.len(), 1);
    assert_eq!(close[0].1, Some(OpCode::Close));
    assert_eq!(&close[0].0[..2], &1001u16.to_be_bytes());
    assert_eq!(lb.server_rec.count_closed(), 1);
}

#[test]
fn test_mailbox_from_other_thread() {
    let mut lb = Loopback::open(Draft::RFC6455);
    let mailbox = lb.client.mailbox(lb.cid).unwrap();
    let worker = std::thread::spawn(move || {
        for i in 0..10 {
            mailbox.push(Message::binary(vec![i])).unwrap();
        }
    });
    worker.join().unwrap();
    lb.pump();

    let payloads: Vec<Vec<u8>> = lb.server_rec.reads().into_iter().map(|(p, _)| p).collect();
    assert_eq!(payloads, (0..10).map(|i| vec![i]).collect::<Vec<_>>());
}

#[test]
fn test_client_rejects_bad_accept() {
    let mut client = Endpoint::with_random(Config::default(), SeededRandom::new(7));
    let mut io = MemoryTransport::new();
    let mut rec = Recorder::default();
    let cid = client
        .connect(&ClientRequest::new(Draft::RFC6455, "example.com", "/"))
        .unwrap();
    client.on_writable(cid, &mut io, &mut rec).unwrap();
    assert!(io.take_outbound(cid).starts_with(b"GET / HTTP/1.1\r\n"));

    io.push_inbound(
        cid,
        b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: bm90IHRoZSByaWdodCBrZXk=\r\n\r\n",
    );
    client.on_readable(cid, &mut io, &mut rec).unwrap();
    assert_eq!(rec.events, vec![Event::Closed(cid)]);
    assert!(io.is_closed(cid));
}

/// Send a Draft-76 client's request through a real server endpoint and
/// return the client with the server's reply (head plus 16-byte token).
fn d76_client_and_reply(config: Config) -> (Endpoint<SeededRandom>, ConnectionId, Vec<u8>) {
    let mut client = Endpoint::with_random(config, SeededRandom::new(3));
    let request = ClientRequest::new(Draft::D76, "example.com", "/demo").with_origin("http://example.com");
    let cid = client.connect(&request).unwrap();
    let mut client_io = MemoryTransport::new();
    client
        .on_writable(cid, &mut client_io, &mut Recorder::default())
        .unwrap();

    let mut srv = server(Config::default());
    let mut server_io = MemoryTransport::new();
    let sid = srv.accept();
    server_io.push_inbound(sid, &client_io.take_outbound(cid));
    srv.on_readable(sid, &mut server_io, &mut Recorder::default())
        .unwrap();
    assert_eq!(srv.state(sid), Some(ChannelState::Established));
    (client, cid, server_io.take_outbound(sid).to_vec())
}

#[test]
fn test_d76_client_token_split_across_reads() {
    let (mut client, cid, reply) = d76_client_and_reply(Config::default());
    let mut io = MemoryTransport::new();
    let mut rec = Recorder::default();

    let (first, rest) = reply.split_at(reply.len() - 12);
    io.push_inbound(cid, first);
    client.on_readable(cid, &mut io, &mut rec).unwrap();
    assert_eq!(client.state(cid), Some(ChannelState::AwaitingHandshake));
    assert_eq!(rec.count_accepted(), 0);

    io.push_inbound(cid, rest);
    io.push_inbound(cid, b"\x00hi\xff");
    client.on_readable(cid, &mut io, &mut rec).unwrap();
    assert_eq!(client.state(cid), Some(ChannelState::Established));
    assert_eq!(client.context(cid).unwrap().body().len(), 16);
    assert_eq!(rec.count_accepted(), 1);
    assert_eq!(rec.reads(), vec![(b"hi".to_vec(), None)]);
}

#[test]
fn test_d76_client_one_byte_reads() {
    let (mut client, cid, reply) = d76_client_and_reply(Config::default().with_read_buffer_size(1));
    let mut io = MemoryTransport::new().with_chunk_size(1);
    let mut rec = Recorder::default();

    io.push_inbound(cid, &reply);
    io.push_inbound(cid, b"\x00hi\xff");
    client.on_readable(cid, &mut io, &mut rec).unwrap();
    assert_eq!(client.state(cid), Some(ChannelState::Established));
    assert_eq!(
        rec.events,
        vec![Event::Accepted(cid), Event::Read(cid, b"hi".to_vec(), None)]
    );
}

#[test]
fn test_d76_client_rejects_wrong_token() {
    let (mut client, cid, mut reply) = d76_client_and_reply(Config::default());
    let mut io = MemoryTransport::new();
    let mut rec = Recorder::default();

    let last = reply.len() - 1;
    reply[last] ^= 0xFF;
    io.push_inbound(cid, &reply);
    client.on_readable(cid, &mut io, &mut rec).unwrap();

    assert_eq!(rec.events, vec![Event::Closed(cid)]);
    assert_eq!(client.state(cid), None);
    assert!(io.is_closed(cid));
}

#[test]
fn test_d76_key_without_spaces_closes_without_response() {
    let mut ep = server(Config::default());
    let mut transport = MemoryTransport::new();
    let mut rec = Recorder::default();
    let id = ep.accept();

    transport.push_inbound(
        id,
        b"GET /demo HTTP/1.1\r\n\
          Host: example.com\r\n\
          Sec-WebSocket-Key1: 4@146546xW%0l15\r\n\
          Sec-WebSocket-Key2: 12998 5 Y3 1  .P00\r\n\
          \r\n\
          ^n:ds[4U",
    );
    ep.on_readable(id, &mut transport, &mut rec).unwrap();

    assert!(transport.take_outbound(id).is_empty());
    assert_eq!(rec.events, vec![Event::Closed(id)]);
    assert_eq!(ep.state(id), None);
}

#[test]
fn test_eof_releases_only_that_channel() {
    let mut ep = server(Config::default());
    let mut transport = MemoryTransport::new();
    let mut rec = Recorder::default();
    let first = ep.accept();
    let second = ep.accept();
    assert_eq!(ep.ids().collect::<Vec<_>>(), vec![first, second]);

    transport.push_inbound(first, D75_REQUEST);
    transport.set_eof(first);
    ep.on_readable(first, &mut transport, &mut rec).unwrap();

    assert_eq!(rec.events[0], Event::Accepted(first));
    assert_eq!(rec.events.last(), Some(&Event::Closed(first)));
    assert!(transport.is_closed(first));
    assert_eq!(ep.ids().collect::<Vec<_>>(), vec![second]);
    assert_eq!(ep.len(), 1);
}
