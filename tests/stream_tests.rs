//! Tests for terminal session pumping.

use hyperlet::stream::Session;
use hyperlet::{Error, pump_session};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

fn session(output: &'static [u8], code: i32) -> Session {
    Session {
        output: Box::new(std::io::Cursor::new(output.to_vec())),
        input: None,
        exit: tokio::spawn(async move { Ok(code) }),
    }
}

#[tokio::test]
async fn test_collect_returns_output_and_code() {
    let (code, out) = session(b"line 1\nline 2\n", 0).collect().await.unwrap();
    assert_eq!(code, 0);
    assert_eq!(out, b"line 1\nline 2\n");
}

#[tokio::test]
async fn test_collect_propagates_exit_error() {
    let s = Session {
        output: Box::new(tokio::io::empty()),
        input: None,
        exit: tokio::spawn(async { Err::<i32, Error>(Error::engine("exec", "container gone")) }),
    };
    assert!(matches!(s.collect().await, Err(Error::EngineCallFailed { .. })));
}

#[tokio::test]
async fn test_pump_copies_output() {
    let (writer, mut reader) = tokio::io::duplex(1024);
    let code = pump_session(
        session(b"hello from the vm", 3),
        None::<tokio::io::Empty>,
        Some(writer),
    )
    .await
    .unwrap();
    assert_eq!(code, 3);

    let mut out = String::new();
    reader.read_to_string(&mut out).await.unwrap();
    assert_eq!(out, "hello from the vm");
}

#[tokio::test]
async fn test_pump_without_stdout_drains() {
    let code = pump_session(
        session(b"discarded", 0),
        None::<tokio::io::Empty>,
        None::<tokio::io::Sink>,
    )
    .await
    .unwrap();
    assert_eq!(code, 0);
}

#[tokio::test]
async fn test_pump_forwards_stdin() {
    // The "command" echoes its terminal input back and exits with the
    // number of bytes it read.
    let (terminal_in, mut command_in) = tokio::io::duplex(64);
    let (mut command_out, terminal_out) = tokio::io::duplex(64);

    let exit = tokio::spawn(async move {
        let mut buf = Vec::new();
        command_in.read_to_end(&mut buf).await?;
        command_out.write_all(&buf).await?;
        command_out.shutdown().await?;
        Ok::<i32, Error>(buf.len() as i32)
    });

    let s = Session {
        output: Box::new(terminal_out),
        input: Some(Box::new(terminal_in)),
        exit,
    };

    let stdin = std::io::Cursor::new(b"ls -l\n".to_vec());
    let (writer, mut reader) = tokio::io::duplex(64);
    let code = pump_session(s, Some(stdin), Some(writer)).await.unwrap();
    assert_eq!(code, 6);

    let mut out = Vec::new();
    reader.read_to_end(&mut out).await.unwrap();
    assert_eq!(out, b"ls -l\n");
}
