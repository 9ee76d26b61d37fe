//! SOCKS5 UDP ASSOCIATE tests against a running proxy

mod common;

use common::{start_proxy, start_proxy_with, start_udp_echo_server, test_config, udp_envelope, TestProxy};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};

/// Run UDP ASSOCIATE and return the control connection and relay address
async fn associate(proxy: &TestProxy, client_udp: SocketAddr) -> (TcpStream, SocketAddr) {
    let mut control = proxy.connect().await;

    control.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
    let mut auth = [0u8; 2];
    control.read_exact(&mut auth).await.unwrap();
    assert_eq!(auth, [0x05, 0x00]);

    let SocketAddr::V4(client_udp) = client_udp else {
        panic!("IPv4 client expected");
    };
    let mut request = vec![0x05, 0x03, 0x00, 0x01];
    request.extend_from_slice(&client_udp.ip().octets());
    request.extend_from_slice(&client_udp.port().to_be_bytes());
    control.write_all(&request).await.unwrap();

    let mut reply = [0u8; 10];
    control.read_exact(&mut reply).await.unwrap();
    assert_eq!(&reply[..4], &[0x05, 0x00, 0x00, 0x01]);

    let ip = std::net::Ipv4Addr::new(reply[4], reply[5], reply[6], reply[7]);
    let port = u16::from_be_bytes([reply[8], reply[9]]);
    (control, SocketAddr::from((ip, port)))
}

async fn recv_with_timeout(socket: &UdpSocket, timeout: Duration) -> Option<(Vec<u8>, SocketAddr)> {
    let mut buf = vec![0u8; 65535];
    match tokio::time::timeout(timeout, socket.recv_from(&mut buf)).await {
        Ok(Ok((len, from))) => Some((buf[..len].to_vec(), from)),
        _ => None,
    }
}

#[tokio::test]
async fn test_associate_reply_names_shared_endpoint() {
    let proxy = start_proxy().await;
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    let (_control, relay) = associate(&proxy, client.local_addr().unwrap()).await;
    assert_eq!(relay, proxy.udp_addr);
}

#[tokio::test]
async fn test_udp_round_trip() {
    let echo = start_udp_echo_server().await;
    let proxy = start_proxy().await;
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    let (_control, relay) = associate(&proxy, client.local_addr().unwrap()).await;

    let datagram = udp_envelope(echo, b"ping");
    client.send_to(&datagram, relay).await.unwrap();

    let (reply, from) = recv_with_timeout(&client, Duration::from_secs(2))
        .await
        .expect("no reply relayed");
    assert_eq!(from, relay);
    // Same header as the request, echoed payload
    assert_eq!(&reply[..10], &datagram[..10]);
    assert_eq!(&reply[10..], b"ping");
}

#[tokio::test]
async fn test_udp_payload_delivered_without_header() {
    let target = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let proxy = start_proxy().await;
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    client
        .send_to(&udp_envelope(target.local_addr().unwrap(), b"payload"), proxy.udp_addr)
        .await
        .unwrap();

    let (data, _) = recv_with_timeout(&target, Duration::from_secs(2))
        .await
        .expect("payload not delivered");
    assert_eq!(data, b"payload");
}

#[tokio::test]
async fn test_udp_same_destination_single_socket() {
    let target = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let dest = target.local_addr().unwrap();
    let proxy = start_proxy().await;
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    client.send_to(&udp_envelope(dest, b"one"), proxy.udp_addr).await.unwrap();
    client.send_to(&udp_envelope(dest, b"two"), proxy.udp_addr).await.unwrap();

    let (_, first_from) = recv_with_timeout(&target, Duration::from_secs(2)).await.unwrap();
    let (_, second_from) = recv_with_timeout(&target, Duration::from_secs(2)).await.unwrap();
    assert_eq!(first_from, second_from);

    let source = client.local_addr().unwrap();
    assert_eq!(proxy.ctx.udp.destination_count(source).await, 1);
}

#[tokio::test]
async fn test_udp_malformed_datagram_dropped() {
    let target = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let proxy = start_proxy().await;
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    let mut datagram = udp_envelope(target.local_addr().unwrap(), b"bad");
    datagram[0] = 0x01;
    client.send_to(&datagram, proxy.udp_addr).await.unwrap();

    let mut fragmented = udp_envelope(target.local_addr().unwrap(), b"frag");
    fragmented[2] = 0x01;
    client.send_to(&fragmented, proxy.udp_addr).await.unwrap();

    assert!(recv_with_timeout(&target, Duration::from_millis(300)).await.is_none());
    assert!(recv_with_timeout(&client, Duration::from_millis(50)).await.is_none());
    assert_eq!(proxy.ctx.udp.session_count().await, 0);
}

#[tokio::test]
async fn test_udp_session_released_with_control_connection() {
    let echo = start_udp_echo_server().await;
    let proxy = start_proxy_with(test_config()).await;
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let source = client.local_addr().unwrap();

    let (control, relay) = associate(&proxy, source).await;

    client.send_to(&udp_envelope(echo, b"hi"), relay).await.unwrap();
    recv_with_timeout(&client, Duration::from_secs(2))
        .await
        .expect("no reply relayed");
    assert_eq!(proxy.ctx.udp.session_count().await, 1);

    drop(control);

    let mut released = false;
    for _ in 0..50 {
        if proxy.ctx.udp.session_count().await == 0 {
            released = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(released);
}
