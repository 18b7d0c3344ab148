use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};
use tracing::debug;

// Plain text, newline delimited protocol
//
//   server -> client   "Enter your name:"
//   client -> server   "<name>"
//   server -> all      "<name>: has joined the chat"
//   client -> server   "<text>" | "/exit"
//   server -> all      "<name>: <text>" | "<name>: has left the chat"

pub const NAME_PROMPT: &str = "Enter your name:";
pub const QUIT_TOKEN: &str = "/exit";
pub const JOINED_TEXT: &str = "has joined the chat";
pub const LEFT_TEXT: &str = "has left the chat";

// longest accepted line, newline excluded
pub const DEFAULT_MAX_LINE_LEN: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    JoinName(String), // first line of a session
    Message(String),
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Prompt,
    UserMessage {
        name: String,
        text: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Handshake,
    Chat,
}

/// Line codec aware of the session handshake: the first decoded line is the
/// display name, every later line is either chat text or the quit command.
#[derive(Debug, Clone)]
pub struct ChatCodec {
    lines: LinesCodec,
    stage: Stage,
}

impl ChatCodec {
    pub fn new() -> Self {
        Self::new_with_max_length(DEFAULT_MAX_LINE_LEN)
    }

    pub fn new_with_max_length(max_length: usize) -> Self {
        ChatCodec {
            lines: LinesCodec::new_with_max_length(max_length),
            stage: Stage::Handshake,
        }
    }

    fn next_request(&mut self, line: String) -> Request {
        match self.stage {
            Stage::Handshake => {
                self.stage = Stage::Chat;
                Request::JoinName(line)
            },
            Stage::Chat if is_quit(&line) => Request::Quit,
            Stage::Chat => Request::Message(line),
        }
    }
}

impl Default for ChatCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Case-insensitive match against the quit command
pub fn is_quit(line: &str) -> bool {
    line.eq_ignore_ascii_case(QUIT_TOKEN)
}

fn to_io_error(e: LinesCodecError) -> std::io::Error {
    match e {
        LinesCodecError::Io(e) => e,
        LinesCodecError::MaxLineLengthExceeded => {
            std::io::Error::new(std::io::ErrorKind::InvalidData, "line length limit exceeded")
        },
    }
}

impl Decoder for ChatCodec {
    type Item = Request;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.lines.decode(src).map_err(to_io_error)? {
            Some(line) => Ok(Some(self.next_request(line))),
            None => Ok(None),
        }
    }

    // a trailing line without '\n' is still delivered before end of stream
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.lines.decode_eof(src).map_err(to_io_error)? {
            Some(line) => {
                debug!("unterminated final line of {} bytes", line.len());
                Ok(Some(self.next_request(line)))
            },
            None => Ok(None),
        }
    }
}

impl Encoder<Response> for ChatCodec {
    type Error = std::io::Error;

    fn encode(&mut self, item: Response, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Response::Prompt => {
                dst.reserve(NAME_PROMPT.len() + 1);
                dst.put_slice(NAME_PROMPT.as_bytes());
            },
            Response::UserMessage{name, text} => {
                dst.reserve(name.len() + text.len() + 3);
                dst.put_slice(name.as_bytes());
                dst.put_slice(b": ");
                dst.put_slice(text.as_bytes());
            },
        }
        dst.put_u8(b'\n');

        Ok(())
    }
}
