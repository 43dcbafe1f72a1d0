//! Streaming `multipart/form-data` encoding.
//!
//! [`encode`] returns immediately with a [`MultipartStream`] and the matching
//! content type. A spawned writer task produces the body into a bounded channel
//! while the transport reads from the other end, so large files are never held
//! in memory as a whole.
//!
//! Fields are written before files; each group keeps insertion order.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::Stream;
use rand::Rng;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;

/// Chunks buffered between the writer task and the reader.
const CHANNEL_CAPACITY: usize = 16;

/// Read size when copying a file from an async reader.
const CHUNK_SIZE: usize = 8 * 1024;

const FILE_CONTENT_TYPE: &str = "application/octet-stream";

/// Where the contents of a file part come from.
pub enum FileSource {
    /// The file is already in memory.
    Bytes(Bytes),
    /// The file is read while the body is being sent. Usable once.
    Reader(Box<dyn AsyncRead + Send + Unpin>),
}

impl fmt::Debug for FileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSource::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            FileSource::Reader(_) => f.write_str("Reader"),
        }
    }
}

/// A plain text form field.
#[derive(Debug, Clone)]
pub struct FormField {
    /// The field name.
    pub name: String,
    /// The field value.
    pub value: String,
}

/// A file form field.
#[derive(Debug)]
pub struct FormFile {
    /// The form field name.
    pub field_name: String,
    /// The file name reported to the server.
    pub file_name: String,
    /// The file contents.
    pub source: FileSource,
}

/// The fields and files of a multipart form.
///
/// # Examples
///
/// ```
/// use callsign::multipart::MultipartForm;
///
/// let form = MultipartForm::new()
///     .field("title", "holiday")
///     .file("photo", "beach.jpg", vec![0xffu8, 0xd8, 0xff]);
///
/// assert!(form.is_replayable());
/// ```
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: Vec<FormField>,
    files: Vec<FormFile>,
}

impl MultipartForm {
    /// Creates an empty form.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a text field.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(FormField {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Adds a file held in memory.
    pub fn file(
        mut self,
        field_name: impl Into<String>,
        file_name: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        self.files.push(FormFile {
            field_name: field_name.into(),
            file_name: file_name.into(),
            source: FileSource::Bytes(data.into()),
        });
        self
    }

    /// Adds a file streamed from an async reader.
    ///
    /// A form holding a reader can only be sent once; the retry loop will not
    /// replay it.
    pub fn file_reader(
        mut self,
        field_name: impl Into<String>,
        file_name: impl Into<String>,
        reader: impl AsyncRead + Send + Unpin + 'static,
    ) -> Self {
        self.files.push(FormFile {
            field_name: field_name.into(),
            file_name: file_name.into(),
            source: FileSource::Reader(Box::new(reader)),
        });
        self
    }

    /// The text fields, in insertion order.
    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    /// The files, in insertion order.
    pub fn files(&self) -> &[FormFile] {
        &self.files
    }

    /// Returns `true` if every file is held in memory.
    pub fn is_replayable(&self) -> bool {
        self.files
            .iter()
            .all(|file| matches!(file.source, FileSource::Bytes(_)))
    }

    /// Copies the form if it can be encoded more than once.
    pub(crate) fn try_clone(&self) -> Option<Self> {
        let files = self
            .files
            .iter()
            .map(|file| match &file.source {
                FileSource::Bytes(bytes) => Some(FormFile {
                    field_name: file.field_name.clone(),
                    file_name: file.file_name.clone(),
                    source: FileSource::Bytes(bytes.clone()),
                }),
                FileSource::Reader(_) => None,
            })
            .collect::<Option<Vec<_>>>()?;

        Some(Self {
            fields: self.fields.clone(),
            files,
        })
    }
}

/// The read end of an encoding in progress.
///
/// Yields body chunks as the writer task produces them. A failure while
/// writing arrives as an `Err` item, after which the stream ends. Dropping the
/// stream stops the writer at its next chunk.
pub struct MultipartStream {
    rx: mpsc::Receiver<io::Result<Bytes>>,
}

impl fmt::Debug for MultipartStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultipartStream").finish_non_exhaustive()
    }
}

impl Stream for MultipartStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Starts encoding `form` and returns the body stream with its content type.
///
/// The content type is `multipart/form-data; boundary=<token>` and must
/// replace any content type already set on the request.
///
/// Must be called from within a tokio runtime.
pub fn encode(form: MultipartForm) -> (MultipartStream, String) {
    let boundary = generate_boundary();
    let content_type = format!("multipart/form-data; boundary={}", boundary);

    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    tokio::spawn(write_form(form, PartWriter::new(boundary, tx)));

    (MultipartStream { rx }, content_type)
}

enum WriteError {
    /// The reader went away.
    Closed,
    Io(io::Error),
}

struct PartWriter {
    boundary: String,
    tx: mpsc::Sender<io::Result<Bytes>>,
    wrote_part: bool,
}

impl PartWriter {
    fn new(boundary: String, tx: mpsc::Sender<io::Result<Bytes>>) -> Self {
        Self {
            boundary,
            tx,
            wrote_part: false,
        }
    }

    async fn send(&self, chunk: Bytes) -> Result<(), WriteError> {
        if chunk.is_empty() {
            return Ok(());
        }
        self.tx.send(Ok(chunk)).await.map_err(|_| WriteError::Closed)
    }

    /// Writes the delimiter and headers that open a part.
    async fn open_part(
        &mut self,
        disposition: String,
        content_type: Option<&str>,
    ) -> Result<(), WriteError> {
        let mut head = String::new();
        if self.wrote_part {
            head.push_str("\r\n");
        }
        head.push_str("--");
        head.push_str(&self.boundary);
        head.push_str("\r\nContent-Disposition: ");
        head.push_str(&disposition);
        head.push_str("\r\n");
        if let Some(content_type) = content_type {
            head.push_str("Content-Type: ");
            head.push_str(content_type);
            head.push_str("\r\n");
        }
        head.push_str("\r\n");

        self.wrote_part = true;
        self.send(Bytes::from(head)).await
    }

    async fn write_field(&mut self, field: FormField) -> Result<(), WriteError> {
        let disposition = format!("form-data; name=\"{}\"", escape_quotes(&field.name));
        self.open_part(disposition, None).await?;
        self.send(Bytes::from(field.value)).await
    }

    async fn write_file(&mut self, file: FormFile) -> Result<(), WriteError> {
        let disposition = format!(
            "form-data; name=\"{}\"; filename=\"{}\"",
            escape_quotes(&file.field_name),
            escape_quotes(&file.file_name)
        );
        self.open_part(disposition, Some(FILE_CONTENT_TYPE)).await?;

        match file.source {
            FileSource::Bytes(bytes) => self.send(bytes).await,
            FileSource::Reader(mut reader) => loop {
                let mut buf = BytesMut::with_capacity(CHUNK_SIZE);
                let read = reader.read_buf(&mut buf).await.map_err(WriteError::Io)?;
                if read == 0 {
                    return Ok(());
                }
                self.send(buf.freeze()).await?;
            },
        }
    }

    async fn close(&self) -> Result<(), WriteError> {
        let tail = if self.wrote_part {
            format!("\r\n--{}--\r\n", self.boundary)
        } else {
            format!("--{}--\r\n", self.boundary)
        };
        self.send(Bytes::from(tail)).await
    }
}

async fn write_form(form: MultipartForm, mut writer: PartWriter) {
    match write_parts(&mut writer, form).await {
        Ok(()) => {}
        Err(WriteError::Closed) => {
            tracing::debug!("Multipart reader dropped before the body was complete");
        }
        Err(WriteError::Io(error)) => {
            tracing::error!(error = %error, "Failed to write multipart body");
            // The reader may already be gone; nothing left to report to.
            let _ = writer.tx.send(Err(error)).await;
        }
    }
}

async fn write_parts(writer: &mut PartWriter, form: MultipartForm) -> Result<(), WriteError> {
    for field in form.fields {
        writer.write_field(field).await?;
    }
    for file in form.files {
        writer.write_file(file).await?;
    }
    writer.close().await
}

/// 30 random bytes, hex encoded.
fn generate_boundary() -> String {
    let mut raw = [0u8; 30];
    rand::thread_rng().fill(&mut raw[..]);
    raw.iter().map(|byte| format!("{:02x}", byte)).collect()
}

fn escape_quotes(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    struct BrokenReader;

    impl AsyncRead for BrokenReader {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut tokio::io::ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::Other, "disk gone")))
        }
    }

    fn boundary_of(content_type: &str) -> String {
        content_type
            .strip_prefix("multipart/form-data; boundary=")
            .unwrap()
            .to_string()
    }

    async fn collect(mut stream: MultipartStream) -> Vec<u8> {
        let mut body = Vec::new();
        while let Some(chunk) = stream.next().await {
            body.extend_from_slice(&chunk.unwrap());
        }
        body
    }

    #[tokio::test]
    async fn test_round_trip_through_multipart_parser() {
        let form = MultipartForm::new()
            .field("a", "1")
            .file("f", "f.txt", "hello");

        let (stream, content_type) = encode(form);
        let boundary = multer::parse_boundary(&content_type).unwrap();
        let mut parsed = multer::Multipart::new(stream, boundary);

        let field = parsed.next_field().await.unwrap().unwrap();
        assert_eq!(field.name(), Some("a"));
        assert_eq!(field.file_name(), None);
        assert_eq!(field.text().await.unwrap(), "1");

        let file = parsed.next_field().await.unwrap().unwrap();
        assert_eq!(file.name(), Some("f"));
        assert_eq!(file.file_name(), Some("f.txt"));
        assert_eq!(file.bytes().await.unwrap(), Bytes::from_static(b"hello"));

        assert!(parsed.next_field().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_exact_wire_layout() {
        let form = MultipartForm::new().field("a", "1").file("f", "f.txt", "hello");

        let (stream, content_type) = encode(form);
        let boundary = boundary_of(&content_type);
        let body = collect(stream).await;

        let expected = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\n1\
             \r\n--{b}\r\nContent-Disposition: form-data; name=\"f\"; filename=\"f.txt\"\r\n\
             Content-Type: application/octet-stream\r\n\r\nhello\
             \r\n--{b}--\r\n",
            b = boundary
        );
        assert_eq!(String::from_utf8(body).unwrap(), expected);
    }

    #[tokio::test]
    async fn test_fields_precede_files() {
        let form = MultipartForm::new()
            .file("first-file", "1.bin", "x")
            .field("first-field", "1")
            .file("second-file", "2.bin", "y")
            .field("second-field", "2");

        let (stream, content_type) = encode(form);
        let boundary = multer::parse_boundary(&content_type).unwrap();
        let mut parsed = multer::Multipart::new(stream, boundary);

        let mut names = Vec::new();
        while let Some(field) = parsed.next_field().await.unwrap() {
            names.push(field.name().unwrap().to_string());
        }
        assert_eq!(
            names,
            vec!["first-field", "second-field", "first-file", "second-file"]
        );
    }

    #[tokio::test]
    async fn test_large_reader_streams_through_small_channel() {
        let payload: Vec<u8> = (0..512 * 1024).map(|i| (i % 251) as u8).collect();
        let form = MultipartForm::new().file_reader(
            "upload",
            "big.bin",
            std::io::Cursor::new(payload.clone()),
        );
        assert!(!form.is_replayable());

        let (stream, content_type) = encode(form);
        let boundary = multer::parse_boundary(&content_type).unwrap();
        let mut parsed = multer::Multipart::new(stream, boundary);

        let file = parsed.next_field().await.unwrap().unwrap();
        assert_eq!(file.bytes().await.unwrap().as_ref(), payload.as_slice());
    }

    #[tokio::test]
    async fn test_reader_failure_surfaces_to_stream() {
        let form = MultipartForm::new()
            .field("a", "1")
            .file_reader("f", "f.txt", BrokenReader);

        let (mut stream, _) = encode(form);

        let mut error = None;
        while let Some(chunk) = stream.next().await {
            if let Err(e) = chunk {
                error = Some(e);
                break;
            }
        }

        let error = error.expect("writer error should reach the reader");
        assert_eq!(error.to_string(), "disk gone");
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_form_is_just_the_closing_delimiter() {
        let (stream, content_type) = encode(MultipartForm::new());
        let boundary = boundary_of(&content_type);

        let body = collect(stream).await;
        assert_eq!(body, format!("--{}--\r\n", boundary).into_bytes());
    }

    #[tokio::test]
    async fn test_names_are_quote_escaped() {
        let form = MultipartForm::new().field("say \"hi\"", "x");
        let (stream, _) = encode(form);

        let body = String::from_utf8(collect(stream).await).unwrap();
        assert!(body.contains("name=\"say \\\"hi\\\"\""));
    }

    #[test]
    fn test_try_clone_only_for_in_memory_forms() {
        let in_memory = MultipartForm::new().field("a", "1").file("f", "f.txt", "hello");
        let copy = in_memory.try_clone().unwrap();
        assert_eq!(copy.fields().len(), 1);
        assert_eq!(copy.files()[0].file_name, "f.txt");

        let streamed = MultipartForm::new().file_reader("f", "f.txt", std::io::Cursor::new(vec![1u8]));
        assert!(streamed.try_clone().is_none());
    }

    #[test]
    fn test_boundary_is_sixty_hex_characters() {
        let boundary = generate_boundary();
        assert_eq!(boundary.len(), 60);
        assert!(boundary.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(boundary, generate_boundary());
    }
}
