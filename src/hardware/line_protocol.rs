//! ASCII line protocol for sensor front-ends
//!
//! Front-end microcontrollers answer a query with one line of comma-separated decimal
//! numbers, terminated by LF:
//!
//! ```text
//! > READ
//! < 1013.25,21.40,48.10
//! ```
//!
//! Error replies start with `ERR`. The number of values must match the reading shape
//! of the sensor role.
//!
//! A query abandoned by a timeout can leave its late reply in the input. Every exchange
//! therefore discards pending input before sending the next query, so a reply always
//! belongs to the query that preceded it.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::hardware::capabilities::{ReadingShape, ShapeKind};

/// Parse one response line into a reading of `kind`.
///
/// Handles whitespace around values, optional `+` signs and scientific notation.
pub fn parse_reading_line(line: &str, kind: ShapeKind) -> Result<ReadingShape> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        bail!("Empty sensor response");
    }
    if trimmed.starts_with("ERR") {
        bail!("Sensor error response: {}", trimmed);
    }

    let values = trimmed
        .split(',')
        .map(|token| {
            let token = token.trim();
            token
                .parse::<f64>()
                .with_context(|| format!("Failed to parse sensor value: '{}'", token))
        })
        .collect::<Result<Vec<f64>>>()?;

    if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
        bail!("Non-finite sensor value: {}", bad);
    }

    ReadingShape::from_values(kind, &values).ok_or_else(|| {
        anyhow!(
            "Expected {} value(s) for {:?} reading, got {} in '{}'",
            kind.arity(),
            kind,
            values.len(),
            trimmed
        )
    })
}

/// Drop every byte already buffered or immediately readable. Returns the count dropped.
pub async fn discard_pending<S>(port: &mut BufReader<S>) -> Result<usize>
where
    S: AsyncRead + Unpin,
{
    let mut discarded = 0;
    loop {
        // A zero timeout still polls the read once, so only data already available is taken.
        let available = match tokio::time::timeout(Duration::ZERO, port.fill_buf()).await {
            Ok(Ok(buf)) => buf.len(),
            Ok(Err(e)) => return Err(e).context("Failed to drain sensor input"),
            Err(_) => 0,
        };
        if available == 0 {
            return Ok(discarded);
        }
        port.consume(available);
        discarded += available;
    }
}

/// Send `command` and read one reply line, after discarding stale input.
pub async fn exchange_line<S>(port: &mut BufReader<S>, command: &str) -> Result<String>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let stale = discard_pending(port).await?;
    if stale > 0 {
        tracing::debug!(bytes = stale, "Discarded stale sensor input");
    }

    let stream = port.get_mut();
    stream
        .write_all(format!("{}\n", command).as_bytes())
        .await
        .context("write failed")?;
    stream.flush().await.context("flush failed")?;

    let mut response = String::new();
    let read = port.read_line(&mut response).await.context("read failed")?;
    if read == 0 {
        bail!("Sensor closed the connection");
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, DuplexStream};

    /// Front-end stand-in: answers each query line with the next scripted reply.
    fn spawn_front_end(device: DuplexStream, replies: Vec<&'static str>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut device = BufReader::new(device);
            for reply in replies {
                let mut query = String::new();
                if device.read_line(&mut query).await.unwrap() == 0 {
                    return;
                }
                assert_eq!(query, "READ\n");
                device.get_mut().write_all(reply.as_bytes()).await.unwrap();
            }
        })
    }

    #[tokio::test]
    async fn late_reply_is_not_taken_for_the_next_one() {
        let (client, mut device) = duplex(256);
        // Reply to an abandoned query arrives before the next exchange starts.
        device.write_all(b"1013.25,21.40,48.10\n").await.unwrap();
        let front_end = spawn_front_end(device, vec!["990.00,18.00,70.00\n"]);

        let mut port = BufReader::new(client);
        tokio::task::yield_now().await;
        let line = exchange_line(&mut port, "READ").await.unwrap();
        assert_eq!(
            parse_reading_line(&line, ShapeKind::Triple).unwrap(),
            ReadingShape::Triple(990.0, 18.0, 70.0)
        );
        front_end.await.unwrap();
    }

    #[tokio::test]
    async fn buffered_extra_line_is_dropped() {
        let (client, device) = duplex(256);
        let front_end = spawn_front_end(device, vec!["1.5\n7.5\n", "2.5\n"]);
        let mut port = BufReader::new(client);

        assert_eq!(exchange_line(&mut port, "READ").await.unwrap(), "1.5\n");
        assert_eq!(exchange_line(&mut port, "READ").await.unwrap(), "2.5\n");
        front_end.await.unwrap();
    }

    #[tokio::test]
    async fn closed_connection_is_an_error() {
        let (client, device) = duplex(64);
        drop(device);
        let mut port = BufReader::new(client);
        assert!(exchange_line(&mut port, "READ").await.is_err());
    }

    #[test]
    fn parses_each_shape() {
        assert_eq!(
            parse_reading_line("18.25\n", ShapeKind::Scalar).unwrap(),
            ReadingShape::Scalar(18.25)
        );
        assert_eq!(
            parse_reading_line("21.4, 48.1", ShapeKind::Pair).unwrap(),
            ReadingShape::Pair(21.4, 48.1)
        );
        assert_eq!(
            parse_reading_line("+1.01325E3,21.40,48.10\r\n", ShapeKind::Triple).unwrap(),
            ReadingShape::Triple(1013.25, 21.4, 48.1)
        );
        assert_eq!(
            parse_reading_line("45.4642,9.1900", ShapeKind::Coordinate).unwrap(),
            ReadingShape::Coordinate {
                lat: 45.4642,
                lon: 9.19
            }
        );
    }

    #[test]
    fn rejects_bad_responses() {
        assert!(parse_reading_line("", ShapeKind::Scalar).is_err());
        assert!(parse_reading_line("ERR 3", ShapeKind::Scalar).is_err());
        assert!(parse_reading_line("abc", ShapeKind::Scalar).is_err());
        assert!(parse_reading_line("NaN", ShapeKind::Scalar).is_err());
        assert!(parse_reading_line("inf,1", ShapeKind::Pair).is_err());

        let err = parse_reading_line("1.0,2.0", ShapeKind::Triple).unwrap_err();
        assert!(err.to_string().contains("Expected 3 value(s)"));
    }
}
