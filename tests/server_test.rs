use canela::server;

use std::future;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, Duration};

/// Bind an ephemeral listener and run the server behind it.
async fn start_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move { server::run(listener, future::pending::<()>()).await });

    addr
}

/// Read a single CRLF-terminated reply line.
async fn read_line(stream: &mut TcpStream) -> Vec<u8> {
    let mut line = vec![];
    loop {
        let mut byte = [0u8; 1];
        stream.read_exact(&mut byte).await.unwrap();
        line.push(byte[0]);
        if line.ends_with(b"\r\n") {
            return line;
        }
    }
}

#[tokio::test]
async fn key_value_get_set_delete() {
    let addr = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(b"*3\r\n$3\r\nSET\r\n$4\r\nname\r\n$5\r\nAlice\r\n")
        .await
        .unwrap();
    let mut response = [0; 5];
    stream.read_exact(&mut response).await.unwrap();
    assert_eq!(b"+OK\r\n", &response);

    stream
        .write_all(b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n")
        .await
        .unwrap();
    let mut response = [0; 11];
    stream.read_exact(&mut response).await.unwrap();
    assert_eq!(b"$5\r\nAlice\r\n", &response);

    stream
        .write_all(b"*2\r\n$6\r\nDELETE\r\n$4\r\nname\r\n")
        .await
        .unwrap();
    let mut response = [0; 4];
    stream.read_exact(&mut response).await.unwrap();
    assert_eq!(b":1\r\n", &response);

    stream
        .write_all(b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n")
        .await
        .unwrap();
    let mut response = [0; 5];
    stream.read_exact(&mut response).await.unwrap();
    assert_eq!(b"$-1\r\n", &response);
}

#[tokio::test]
async fn mget_mixes_hits_and_nils() {
    let addr = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(b"*7\r\n$4\r\nMSET\r\n$1\r\na\r\n$1\r\n1\r\n$1\r\nb\r\n$1\r\n2\r\n$1\r\nc\r\n$1\r\n3\r\n")
        .await
        .unwrap();
    let mut response = [0; 5];
    stream.read_exact(&mut response).await.unwrap();
    assert_eq!(b"+OK\r\n", &response);

    stream
        .write_all(b"*4\r\n$4\r\nMGET\r\n$1\r\na\r\n$1\r\nx\r\n$1\r\nc\r\n")
        .await
        .unwrap();
    let mut response = [0; 23];
    stream.read_exact(&mut response).await.unwrap();
    assert_eq!(&b"*3\r\n$1\r\n1\r\n$-1\r\n$1\r\n3\r\n"[..], &response[..]);
}

#[tokio::test]
async fn pexpire_makes_keys_vanish() {
    let addr = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n")
        .await
        .unwrap();
    let mut response = [0; 5];
    stream.read_exact(&mut response).await.unwrap();
    assert_eq!(b"+OK\r\n", &response);

    stream
        .write_all(b"*3\r\n$7\r\nPEXPIRE\r\n$1\r\nk\r\n$3\r\n200\r\n")
        .await
        .unwrap();
    let mut response = [0; 4];
    stream.read_exact(&mut response).await.unwrap();
    assert_eq!(b":1\r\n", &response);

    // Still inside the deadline.
    stream
        .write_all(b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n")
        .await
        .unwrap();
    let mut response = [0; 7];
    stream.read_exact(&mut response).await.unwrap();
    assert_eq!(b"$1\r\nv\r\n", &response);

    sleep(Duration::from_millis(400)).await;

    stream
        .write_all(b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n")
        .await
        .unwrap();
    let mut response = [0; 5];
    stream.read_exact(&mut response).await.unwrap();
    assert_eq!(b"$-1\r\n", &response);

    stream
        .write_all(b"*2\r\n$6\r\nEXISTS\r\n$1\r\nk\r\n")
        .await
        .unwrap();
    let mut response = [0; 4];
    stream.read_exact(&mut response).await.unwrap();
    assert_eq!(b":0\r\n", &response);
}

#[tokio::test]
async fn keys_enumerates_by_glob() {
    let addr = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    for request in [
        &b"*1\r\n$5\r\nFLUSH\r\n"[..],
        &b"*3\r\n$3\r\nSET\r\n$1\r\na\r\n$1\r\n1\r\n"[..],
        &b"*3\r\n$3\r\nSET\r\n$1\r\nb\r\n$1\r\n2\r\n"[..],
        &b"*3\r\n$3\r\nSET\r\n$2\r\nab\r\n$1\r\n3\r\n"[..],
    ] {
        stream.write_all(request).await.unwrap();
        let mut response = [0; 5];
        stream.read_exact(&mut response).await.unwrap();
        assert_eq!(b"+OK\r\n", &response);
    }

    stream
        .write_all(b"*2\r\n$4\r\nKEYS\r\n$2\r\na*\r\n")
        .await
        .unwrap();

    // Exactly `a` and `ab`, in unspecified order: both orders have the same
    // byte length.
    let mut response = [0; 19];
    stream.read_exact(&mut response).await.unwrap();
    assert!(
        &response[..] == &b"*2\r\n$1\r\na\r\n$2\r\nab\r\n"[..]
            || &response[..] == &b"*2\r\n$2\r\nab\r\n$1\r\na\r\n"[..],
        "unexpected KEYS reply: {:?}",
        response
    );
}

#[tokio::test]
async fn ttl_state_machine() {
    let addr = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(b"*3\r\n$6\r\nEXPIRE\r\n$7\r\nmissing\r\n$2\r\n10\r\n")
        .await
        .unwrap();
    assert_eq!(b":0\r\n"[..], read_line(&mut stream).await[..]);

    stream
        .write_all(b"*2\r\n$3\r\nTTL\r\n$7\r\nmissing\r\n")
        .await
        .unwrap();
    assert_eq!(b":-2\r\n"[..], read_line(&mut stream).await[..]);

    stream
        .write_all(b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n")
        .await
        .unwrap();
    assert_eq!(b"+OK\r\n"[..], read_line(&mut stream).await[..]);

    stream
        .write_all(b"*2\r\n$3\r\nTTL\r\n$1\r\nk\r\n")
        .await
        .unwrap();
    assert_eq!(b":-1\r\n"[..], read_line(&mut stream).await[..]);

    stream
        .write_all(b"*3\r\n$6\r\nEXPIRE\r\n$1\r\nk\r\n$2\r\n60\r\n")
        .await
        .unwrap();
    assert_eq!(b":1\r\n"[..], read_line(&mut stream).await[..]);

    stream
        .write_all(b"*2\r\n$3\r\nTTL\r\n$1\r\nk\r\n")
        .await
        .unwrap();
    let line = read_line(&mut stream).await;
    assert_eq!(b':', line[0]);
    let remaining: i64 = std::str::from_utf8(&line[1..line.len() - 2])
        .unwrap()
        .parse()
        .unwrap();
    assert!((0..=60).contains(&remaining), "ttl {remaining} out of range");
}

#[tokio::test]
async fn malformed_frame_gets_error_then_close() {
    let addr = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    // Second array element lacks a bulk header.
    stream
        .write_all(b"*2\r\n$3\r\nGET\r\nXYZ")
        .await
        .unwrap();

    let mut response = vec![];
    stream.read_to_end(&mut response).await.unwrap();
    assert!(
        response.starts_with(b"-ERR"),
        "expected error reply, got {:?}",
        response
    );
    // read_to_end returning means the server closed the connection.
}

#[tokio::test]
async fn inline_commands() {
    let addr = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream.write_all(b"PING\r\n").await.unwrap();
    assert_eq!(b"+PONG\r\n"[..], read_line(&mut stream).await[..]);

    stream.write_all(b"SET greeting hey\r\n").await.unwrap();
    assert_eq!(b"+OK\r\n"[..], read_line(&mut stream).await[..]);

    stream.write_all(b"GET greeting\r\n").await.unwrap();
    let mut response = [0; 9];
    stream.read_exact(&mut response).await.unwrap();
    assert_eq!(b"$3\r\nhey\r\n", &response);

    // A blank inline line is ignored, not answered.
    stream.write_all(b"\r\nPING\r\n").await.unwrap();
    assert_eq!(b"+PONG\r\n"[..], read_line(&mut stream).await[..]);
}

#[tokio::test]
async fn empty_value_is_stored() {
    let addr = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$0\r\n\r\n")
        .await
        .unwrap();
    assert_eq!(b"+OK\r\n"[..], read_line(&mut stream).await[..]);

    stream
        .write_all(b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n")
        .await
        .unwrap();
    let mut response = [0; 6];
    stream.read_exact(&mut response).await.unwrap();
    assert_eq!(b"$0\r\n\r\n", &response);
}

#[tokio::test]
async fn binary_safe_keys_and_values() {
    let addr = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let key = b"k\x00\xff";
    let value: Vec<u8> = (0u8..=255).collect();

    let mut request = Vec::new();
    request.extend_from_slice(b"*3\r\n$3\r\nSET\r\n$3\r\n");
    request.extend_from_slice(key);
    request.extend_from_slice(b"\r\n$256\r\n");
    request.extend_from_slice(&value);
    request.extend_from_slice(b"\r\n");
    stream.write_all(&request).await.unwrap();
    assert_eq!(b"+OK\r\n"[..], read_line(&mut stream).await[..]);

    let mut request = Vec::new();
    request.extend_from_slice(b"*2\r\n$3\r\nGET\r\n$3\r\n");
    request.extend_from_slice(key);
    request.extend_from_slice(b"\r\n");
    stream.write_all(&request).await.unwrap();

    let mut expected = Vec::new();
    expected.extend_from_slice(b"$256\r\n");
    expected.extend_from_slice(&value);
    expected.extend_from_slice(b"\r\n");
    let mut response = vec![0; expected.len()];
    stream.read_exact(&mut response).await.unwrap();
    assert_eq!(expected, response);
}

#[tokio::test]
async fn command_errors_keep_the_connection() {
    let addr = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream.write_all(b"*1\r\n$3\r\nGET\r\n").await.unwrap();
    assert_eq!(
        b"-ERR wrong number of arguments for 'get'\r\n"[..],
        read_line(&mut stream).await[..]
    );

    stream
        .write_all(b"*3\r\n$6\r\nEXPIRE\r\n$1\r\nk\r\n$3\r\nfoo\r\n")
        .await
        .unwrap();
    assert_eq!(
        b"-ERR value is not an integer or out of range\r\n"[..],
        read_line(&mut stream).await[..]
    );

    stream
        .write_all(b"*3\r\n$6\r\nEXPIRE\r\n$1\r\nk\r\n$1\r\n0\r\n")
        .await
        .unwrap();
    assert_eq!(
        b"-ERR value is not an integer or out of range\r\n"[..],
        read_line(&mut stream).await[..]
    );

    // Odd MSET argument count mutates nothing.
    stream
        .write_all(b"*4\r\n$4\r\nMSET\r\n$1\r\nq\r\n$1\r\n1\r\n$1\r\nr\r\n")
        .await
        .unwrap();
    assert_eq!(
        b"-ERR wrong number of arguments for 'mset'\r\n"[..],
        read_line(&mut stream).await[..]
    );
    stream.write_all(b"*2\r\n$3\r\nGET\r\n$1\r\nq\r\n").await.unwrap();
    assert_eq!(b"$-1\r\n"[..], read_line(&mut stream).await[..]);

    stream
        .write_all(b"*5\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n$3\r\nBAD\r\n$1\r\n1\r\n")
        .await
        .unwrap();
    assert_eq!(b"-ERR syntax error\r\n"[..], read_line(&mut stream).await[..]);

    stream.write_all(b"*1\r\n$3\r\nFOO\r\n").await.unwrap();
    assert_eq!(
        b"-ERR unknown command 'FOO'\r\n"[..],
        read_line(&mut stream).await[..]
    );

    // After all of that the connection still works.
    stream.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();
    assert_eq!(b"+PONG\r\n"[..], read_line(&mut stream).await[..]);
}

#[tokio::test]
async fn set_with_expiration_options() {
    let addr = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(b"*5\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n$2\r\nPX\r\n$3\r\n200\r\n")
        .await
        .unwrap();
    assert_eq!(b"+OK\r\n"[..], read_line(&mut stream).await[..]);

    stream.write_all(b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n").await.unwrap();
    let mut response = [0; 7];
    stream.read_exact(&mut response).await.unwrap();
    assert_eq!(b"$1\r\nv\r\n", &response);

    sleep(Duration::from_millis(400)).await;

    stream.write_all(b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n").await.unwrap();
    assert_eq!(b"$-1\r\n"[..], read_line(&mut stream).await[..]);

    // A plain SET clears a previous deadline.
    stream
        .write_all(b"*5\r\n$3\r\nSET\r\n$1\r\nj\r\n$1\r\nv\r\n$2\r\nEX\r\n$2\r\n60\r\n")
        .await
        .unwrap();
    assert_eq!(b"+OK\r\n"[..], read_line(&mut stream).await[..]);
    stream
        .write_all(b"*3\r\n$3\r\nSET\r\n$1\r\nj\r\n$1\r\nw\r\n")
        .await
        .unwrap();
    assert_eq!(b"+OK\r\n"[..], read_line(&mut stream).await[..]);
    stream.write_all(b"*2\r\n$3\r\nTTL\r\n$1\r\nj\r\n").await.unwrap();
    assert_eq!(b":-1\r\n"[..], read_line(&mut stream).await[..]);
}

#[tokio::test]
async fn quit_closes_the_session() {
    let addr = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream.write_all(b"*1\r\n$4\r\nQUIT\r\n").await.unwrap();

    let mut response = vec![];
    stream.read_to_end(&mut response).await.unwrap();
    assert_eq!(b"+OK\r\n"[..], response[..]);
}

#[tokio::test]
async fn shutdown_stops_the_server() {
    let addr = start_server().await;
    let mut bystander = TcpStream::connect(addr).await.unwrap();
    let mut stream = TcpStream::connect(addr).await.unwrap();

    // Make sure the bystander session is fully up before pulling the plug.
    bystander.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();
    assert_eq!(b"+PONG\r\n"[..], read_line(&mut bystander).await[..]);

    stream.write_all(b"*1\r\n$8\r\nSHUTDOWN\r\n").await.unwrap();
    let mut response = vec![];
    stream.read_to_end(&mut response).await.unwrap();
    assert_eq!(b"+OK\r\n"[..], response[..]);

    // Every other live session is drained too.
    let mut response = vec![];
    bystander.read_to_end(&mut response).await.unwrap();
    assert!(response.is_empty());
}

#[tokio::test]
async fn concurrent_writers_never_tear_values() {
    let addr = start_server().await;

    let mut handles = vec![];
    for i in 0..8u8 {
        handles.push(tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            let digit = b'0' + i;
            for _ in 0..100 {
                let request = [
                    &b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\n"[..],
                    &[digit][..],
                    &b"\r\n"[..],
                ]
                .concat();
                stream.write_all(&request).await.unwrap();
                let mut response = [0; 5];
                stream.read_exact(&mut response).await.unwrap();
                assert_eq!(b"+OK\r\n", &response);

                stream
                    .write_all(b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n")
                    .await
                    .unwrap();
                let mut response = [0; 7];
                stream.read_exact(&mut response).await.unwrap();
                assert_eq!(&response[..4], b"$1\r\n");
                assert!(
                    (b'0'..=b'7').contains(&response[4]),
                    "torn value {:?}",
                    response
                );
                assert_eq!(&response[5..], b"\r\n");
            }
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }
}
