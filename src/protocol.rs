use crate::{Result, error::OgnClientError, protocol::beacon::Beacon};

pub mod aprs;
pub mod beacon;

/// Capability that turns a raw APRS sentence into a beacon
///
/// The client owns none of the APRS/OGN grammar; it only decides when to call
/// the decoder and what to do with its result.
///
/// Implementations return:
/// * `Ok(Some(beacon))` - the line was decoded
/// * `Ok(None)` - the line is not a beacon (server comment, unsupported
///   format) or its beacon kind is disabled by the `allow_*` flags
/// * `Err(_)` - the line looked like a beacon but could not be decoded
///
/// Any `Fn(&str, bool, bool) -> Result<Option<Beacon>>` closure is a decoder.
pub trait SentenceDecoder: Send + Sync {
    fn decode(
        &self,
        line: &str,
        allow_aircraft: bool,
        allow_receiver: bool,
    ) -> Result<Option<Beacon>>;
}

impl<F> SentenceDecoder for F
where
    F: Fn(&str, bool, bool) -> Result<Option<Beacon>> + Send + Sync,
{
    fn decode(
        &self,
        line: &str,
        allow_aircraft: bool,
        allow_receiver: bool,
    ) -> Result<Option<Beacon>> {
        self(line, allow_aircraft, allow_receiver)
    }
}

/// Capability that formats the login sentence sent right after connecting
pub trait LoginFormatter: Send + Sync {
    fn format(
        &self,
        client_id: &str,
        passcode: &str,
        app_name: &str,
        app_version: &str,
        filter: Option<&str>,
    ) -> String;
}

pub trait AprsLineDecode: futures_io::AsyncBufRead + Unpin + Send {
    /// Reads one sentence from the stream
    ///
    /// Returns `None` at end of stream. Trailing CR/LF is stripped and
    /// invalid UTF-8 is replaced rather than rejected, so a single garbled
    /// line never tears down the connection.
    fn read_sentence(
        &mut self,
        buf: &mut Vec<u8>,
    ) -> impl std::future::Future<Output = Result<Option<String>>> + Send {
        async move {
            use futures_util::AsyncBufReadExt;

            buf.clear();
            let bytes_read = self
                .read_until(b'\n', buf)
                .await
                .map_err(OgnClientError::IoError)?;
            if bytes_read == 0 {
                return Ok(None); // EOF reached
            }

            let line = String::from_utf8_lossy(buf)
                .trim_end_matches(['\r', '\n'])
                .to_string();
            Ok(Some(line))
        }
    }
}

impl<R: futures_io::AsyncBufRead + Unpin + Send + ?Sized> AprsLineDecode for R {}

pub trait AprsLineEncode: futures_io::AsyncWrite + Unpin + Send {
    /// Writes `line` followed by CR LF and flushes
    fn write_line(&mut self, line: &str) -> impl std::future::Future<Output = Result<()>> + Send {
        async move {
            use futures_util::AsyncWriteExt;

            let mut frame = String::with_capacity(line.len() + 2);
            frame.push_str(line);
            frame.push_str("\r\n");
            self.write_all(frame.as_bytes())
                .await
                .map_err(OgnClientError::IoError)?;
            self.flush().await.map_err(OgnClientError::IoError)
        }
    }
}

impl<W: futures_io::AsyncWrite + Unpin + Send + ?Sized> AprsLineEncode for W {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_sentence_strips_terminators() {
        let data: &[u8] = b"FLRDDA5BA>APRS,qAS,LFMX:/155000h\r\n# aprsc 2.1\nlast";
        let mut reader = futures_util::io::BufReader::new(data);
        let mut buf = Vec::new();

        assert_eq!(
            reader.read_sentence(&mut buf).await.unwrap().as_deref(),
            Some("FLRDDA5BA>APRS,qAS,LFMX:/155000h")
        );
        assert_eq!(
            reader.read_sentence(&mut buf).await.unwrap().as_deref(),
            Some("# aprsc 2.1")
        );
        assert_eq!(
            reader.read_sentence(&mut buf).await.unwrap().as_deref(),
            Some("last")
        );
        assert!(reader.read_sentence(&mut buf).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_sentence_tolerates_invalid_utf8() {
        let data: &[u8] = b"abc\xffdef\n";
        let mut reader = futures_util::io::BufReader::new(data);
        let mut buf = Vec::new();

        let line = reader.read_sentence(&mut buf).await.unwrap().unwrap();
        assert!(line.starts_with("abc"));
        assert!(line.ends_with("def"));
    }

    #[tokio::test]
    async fn test_write_line_appends_crlf() {
        let mut out = futures_util::io::Cursor::new(Vec::new());
        out.write_line("user OGN123456 pass -1").await.unwrap();
        assert_eq!(out.into_inner(), b"user OGN123456 pass -1\r\n");
    }
}
