use std::io::Write;
use std::net::{TcpListener, TcpStream, UdpSocket};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, unbounded};

use square::{ConnectionListener, TcpReceiver, UdpReceiver};

const RECV_TIMEOUT: Duration = Duration::from_millis(500);

fn recv_or_panic<T>(rx: &Receiver<T>, what: &str) -> T {
    match rx.recv_timeout(RECV_TIMEOUT) {
        Ok(value) => value,
        Err(_) => panic!("timed out waiting for {what}"),
    }
}

#[test]
fn test_listener_publishes_accepted_connections() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let server_addr = listener.local_addr().unwrap();
    let (tx, rx) = unbounded();
    let mut listener = ConnectionListener::spawn(listener, tx).unwrap();

    let client = TcpStream::connect(server_addr).unwrap();
    let client_addr = client.local_addr().unwrap();

    let (_stream, peer) = recv_or_panic(&rx, "accepted connection");
    assert_eq!(peer, client_addr);

    listener.stop();
    // The loopback wake connection used by stop is not published.
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_one_shot_receiver_reads_once_then_signals_disconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let server_addr = listener.local_addr().unwrap();

    let mut client = TcpStream::connect(server_addr).unwrap();
    let (server_stream, peer) = listener.accept().unwrap();

    let (msg_tx, msg_rx) = unbounded();
    let (disc_tx, disc_rx) = unbounded();
    let mut receiver =
        TcpReceiver::spawn_one_shot(server_stream, peer, msg_tx, disc_tx).unwrap();

    client.write_all(b"hello").unwrap();

    assert_eq!(recv_or_panic(&msg_rx, "tcp message"), "hello");
    // One receive attempt, then the unconditional disconnect signal.
    assert_eq!(recv_or_panic(&disc_rx, "disconnect signal"), peer);

    receiver.stop();
}

#[test]
fn test_one_shot_receiver_signals_disconnect_on_peer_close() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let server_addr = listener.local_addr().unwrap();

    let client = TcpStream::connect(server_addr).unwrap();
    let (server_stream, peer) = listener.accept().unwrap();

    let (msg_tx, msg_rx) = unbounded();
    let (disc_tx, disc_rx) = unbounded();
    let mut receiver =
        TcpReceiver::spawn_one_shot(server_stream, peer, msg_tx, disc_tx).unwrap();

    drop(client);

    assert_eq!(recv_or_panic(&disc_rx, "disconnect signal"), peer);
    assert!(msg_rx.try_recv().is_err());

    receiver.stop();
}

#[test]
fn test_client_receiver_loops_until_stopped() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let server_addr = listener.local_addr().unwrap();

    let client = TcpStream::connect(server_addr).unwrap();
    let (mut server_stream, _) = listener.accept().unwrap();

    let (msg_tx, msg_rx) = unbounded();
    let mut receiver = TcpReceiver::spawn(client, msg_tx).unwrap();

    server_stream.write_all(b"client_connect;;A;;100;;100").unwrap();
    assert_eq!(
        recv_or_panic(&msg_rx, "first message"),
        "client_connect;;A;;100;;100"
    );

    // One receive call per message; give the first read time to drain.
    thread::sleep(Duration::from_millis(50));
    server_stream.write_all(b"client_disconnect;;A").unwrap();
    assert_eq!(recv_or_panic(&msg_rx, "second message"), "client_disconnect;;A");

    receiver.stop();
}

#[test]
fn test_udp_receiver_publishes_datagrams_with_source() {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    let bound_addr = socket.local_addr().unwrap();

    let (tx, rx) = unbounded();
    let mut receiver = UdpReceiver::spawn(socket, tx).unwrap();

    let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
    sender.send_to(b"3;0;120;100", bound_addr).unwrap();

    let (peer, payload) = recv_or_panic(&rx, "datagram");
    assert_eq!(peer, sender.local_addr().unwrap());
    assert_eq!(payload, "3;0;120;100");

    receiver.stop();
}

#[test]
fn test_udp_receiver_stop_unblocks_and_joins() {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    let (tx, rx) = unbounded();
    let mut receiver = UdpReceiver::spawn(socket, tx).unwrap();

    // No traffic at all; stop must still return promptly.
    receiver.stop();
    assert!(rx.try_recv().is_err());
}
