use std::io::Write;
use std::net::{TcpListener, TcpStream, UdpSocket};
use std::thread;
use std::time::{Duration, Instant};

use glam::vec2;

use square::{PlayerId, Position, Velocity};
use square_client::dead_reckoning::DeadReckoning;
use square_client::{ClientConfig, ClientSession};

const POLL_TIMEOUT: Duration = Duration::from_secs(2);
const FRAME: f32 = 1.0 / 60.0;

/// A hand-driven stand-in for the real server: one accepted TCP stream
/// for control messages and a UDP socket for snapshots.
struct StubServer {
    tcp: TcpStream,
    udp: UdpSocket,
}

fn start_session() -> (ClientSession, StubServer) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let server_addr = listener.local_addr().unwrap();
    let udp = UdpSocket::bind(server_addr).unwrap();

    let session = ClientSession::connect(ClientConfig::new(server_addr)).unwrap();
    let (tcp, _) = listener.accept().unwrap();
    (session, StubServer { tcp, udp })
}

fn update_until(session: &mut ClientSession, mut pred: impl FnMut(&ClientSession) -> bool) {
    let start = Instant::now();
    while start.elapsed() < POLL_TIMEOUT {
        session.update(FRAME);
        if pred(session) {
            return;
        }
        thread::sleep(Duration::from_millis(5));
    }
    panic!("condition not reached within {POLL_TIMEOUT:?}");
}

#[test]
fn test_connect_command_creates_seeded_remote_entity() {
    let (mut session, mut server) = start_session();

    server
        .tcp
        .write_all(b"client_connect;;10.0.0.9:4567;;100;;100")
        .unwrap();

    let remote_id = PlayerId::from("10.0.0.9:4567");
    update_until(&mut session, |s| s.entity_of(&remote_id).is_some());

    let entity = session.entity_of(&remote_id).unwrap();
    let dr = session.registry().get::<DeadReckoning>(entity).unwrap();
    assert_eq!(dr.position, vec2(100.0, 100.0));
    assert_eq!(dr.previous_position, vec2(100.0, 100.0));
    assert_eq!(dr.velocity, glam::Vec2::ZERO);
    assert_eq!(dr.acceleration, glam::Vec2::ZERO);
    assert_eq!(
        session.registry().get::<Position>(entity),
        Some(&Position(vec2(100.0, 100.0)))
    );

    // Not the local player, so no entity binding.
    assert!(session.my_entity().is_none());
    session.stop();
}

#[test]
fn test_own_connect_command_binds_local_entity() {
    let (mut session, mut server) = start_session();

    let msg = format!("client_connect;;{};;100;;100", session.my_id());
    server.tcp.write_all(msg.as_bytes()).unwrap();

    update_until(&mut session, |s| s.my_entity().is_some());
    let me = session.my_entity().unwrap();
    assert_eq!(
        session.registry().get::<Position>(me),
        Some(&Position(vec2(100.0, 100.0)))
    );
    session.stop();
}

#[test]
fn test_disconnect_command_removes_entity() {
    let (mut session, mut server) = start_session();

    server
        .tcp
        .write_all(b"client_connect;;10.0.0.9:4567;;100;;100")
        .unwrap();
    let remote_id = PlayerId::from("10.0.0.9:4567");
    update_until(&mut session, |s| s.entity_of(&remote_id).is_some());

    server.tcp.write_all(b"client_disconnect;;10.0.0.9:4567").unwrap();
    update_until(&mut session, |s| s.entity_of(&remote_id).is_none());
    assert_eq!(session.player_count(), 0);
    session.stop();
}

#[test]
fn test_snapshot_creates_then_corrects_remote_entity() {
    let (mut session, server) = start_session();
    let client_udp_addr = session.my_id().socket_addr().unwrap();

    // First sight of player B: created at the reported position, sample
    // not yet applied as history.
    server
        .udp
        .send_to(b"10.0.0.9:4567;3;0;120;100", client_udp_addr)
        .unwrap();
    let remote_id = PlayerId::from("10.0.0.9:4567");
    update_until(&mut session, |s| s.entity_of(&remote_id).is_some());

    let entity = session.entity_of(&remote_id).unwrap();
    assert_eq!(
        session.registry().get::<Position>(entity),
        Some(&Position(vec2(120.0, 100.0)))
    );

    // Second snapshot becomes real history. The 40-unit jump leaves the
    // blended prediction more than the snap threshold away from the
    // authoritative x, so the same frame snaps the render position onto it.
    server
        .udp
        .send_to(b"10.0.0.9:4567;3;0;160;100", client_udp_addr)
        .unwrap();
    update_until(&mut session, |s| {
        let e = s.entity_of(&remote_id).unwrap();
        let dr = s.registry().get::<DeadReckoning>(e).unwrap();
        dr.position == vec2(160.0, 100.0)
    });

    let position = session.registry().get::<Position>(entity).unwrap();
    assert_eq!(position.0.x, 160.0);
    assert_eq!(position.0.y, 100.0);

    // Remote entities are never driven by local input.
    assert_eq!(
        session.registry().get::<Velocity>(entity),
        Some(&Velocity::default())
    );
    session.stop();
}

#[test]
fn test_malformed_traffic_is_dropped_not_fatal() {
    let (mut session, mut server) = start_session();
    let client_udp_addr = session.my_id().socket_addr().unwrap();

    server.tcp.write_all(b"client_warp;;nowhere").unwrap();
    server.udp.send_to(b"garbage;;;", client_udp_addr).unwrap();
    thread::sleep(Duration::from_millis(100));

    // Both messages decode to errors and are discarded; the session keeps
    // updating.
    for _ in 0..5 {
        session.update(FRAME);
    }
    assert_eq!(session.player_count(), 0);

    // And a well-formed message afterwards still works.
    server
        .tcp
        .write_all(b"client_connect;;10.0.0.9:4567;;100;;100")
        .unwrap();
    let remote_id = PlayerId::from("10.0.0.9:4567");
    update_until(&mut session, |s| s.entity_of(&remote_id).is_some());
    session.stop();
}
