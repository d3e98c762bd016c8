//! # Photo
//!
//! Pictures come back from the drone as a file transfer on the control link:
//!
//! ```text
//!   client                         drone
//!     │ ── take picture ──────────► │
//!     │ ◄────────── file size ───── │  (type, size, file id)
//!     │ ── file size ack ─────────► │
//!     │ ◄────────── file data ───── │  x N  (piece, chunk, bytes)
//!     │ ── piece ack ─────────────► │  after every 8 chunks
//!     │ ── piece ack (done) ──────► │
//!     │ ── file done ─────────────► │
//! ```
//!
//! [`PhotoAssembler`] holds the download state and returns the replies the
//! link must send; it never touches a socket.

use crate::error::{Error, Result};
use crate::protocol::Command;
use std::collections::BTreeMap;

/// Chunks the drone sends before waiting for a piece ack.
pub const CHUNKS_PER_PIECE: usize = 8;

/// Header bytes in front of the data of a file chunk.
const CHUNK_HEADER: usize = 12;

// =============================================================================
// WIRE TYPES
// =============================================================================

/// The drone announcing a file (message 0x0062).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileAnnouncement {
    pub file_type: u8,
    pub size: u32,
    pub file_id: u16,
}

impl FileAnnouncement {
    pub const LEN: usize = 7;

    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() < Self::LEN {
            return Err(Error::ShortPayload {
                message: "file size",
                needed: Self::LEN,
                actual: payload.len(),
            });
        }
        Ok(Self {
            file_type: payload[0],
            size: u32::from_le_bytes([payload[1], payload[2], payload[3], payload[4]]),
            file_id: u16::from_le_bytes([payload[5], payload[6]]),
        })
    }
}

/// One chunk of file data (message 0x0063).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChunk {
    pub file_id: u16,
    pub piece: u32,
    pub chunk: u32,
    pub data: Vec<u8>,
}

impl FileChunk {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() < CHUNK_HEADER {
            return Err(Error::ShortPayload {
                message: "file data",
                needed: CHUNK_HEADER,
                actual: payload.len(),
            });
        }
        let len = u16::from_le_bytes([payload[10], payload[11]]) as usize;
        let Some(data) = payload.get(CHUNK_HEADER..CHUNK_HEADER + len) else {
            return Err(Error::ShortPayload {
                message: "file data",
                needed: CHUNK_HEADER + len,
                actual: payload.len(),
            });
        };
        Ok(Self {
            file_id: u16::from_le_bytes([payload[0], payload[1]]),
            piece: u32::from_le_bytes([payload[2], payload[3], payload[4], payload[5]]),
            chunk: u32::from_le_bytes([payload[6], payload[7], payload[8], payload[9]]),
            data: data.to_vec(),
        })
    }
}

// =============================================================================
// ASSEMBLY
// =============================================================================

/// A completely received picture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    pub file_id: u16,
    pub file_type: u8,
    /// JPEG bytes.
    pub data: Vec<u8>,
}

#[derive(Debug)]
struct Download {
    file: FileAnnouncement,
    chunks: BTreeMap<(u32, u32), Vec<u8>>,
    received: usize,
}

impl Download {
    fn chunks_in_piece(&self, piece: u32) -> usize {
        self.chunks.range((piece, 0)..=(piece, u32::MAX)).count()
    }
}

/// Reassembles pictures from file transfer messages.
#[derive(Debug, Default)]
pub struct PhotoAssembler {
    download: Option<Download>,
    /// Last completed file, so a resent final chunk gets its `FileDone` again.
    finished: Option<(u16, u32)>,
    photos: Vec<Photo>,
}

impl PhotoAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start receiving the announced file. Returns the replies to send.
    ///
    /// A new file id abandons any unfinished download.
    pub fn announce(&mut self, file: FileAnnouncement) -> Vec<Command> {
        let same = self
            .download
            .as_ref()
            .is_some_and(|d| d.file.file_id == file.file_id);
        if !same {
            self.download = Some(Download {
                file,
                chunks: BTreeMap::new(),
                received: 0,
            });
        }
        vec![Command::FileSizeAck]
    }

    /// Store one chunk. Returns the replies to send.
    pub fn chunk(&mut self, chunk: FileChunk) -> Vec<Command> {
        if let Some((file_id, size)) = self.finished {
            if chunk.file_id == file_id && self.download.is_none() {
                return vec![
                    Command::FilePieceAck {
                        done: true,
                        file_id,
                        piece: chunk.piece,
                    },
                    Command::FileDone { file_id, size },
                ];
            }
        }

        let Some(download) = self.download.as_mut() else {
            return Vec::new();
        };
        if download.file.file_id != chunk.file_id {
            return Vec::new();
        }

        let file_id = chunk.file_id;
        let piece = chunk.piece;
        if let std::collections::btree_map::Entry::Vacant(slot) = download.chunks.entry((piece, chunk.chunk)) {
            download.received += chunk.data.len();
            slot.insert(chunk.data);
        }

        let size = download.file.size;
        if download.received >= size as usize {
            return self.finish(piece);
        }

        if download.chunks_in_piece(piece) >= CHUNKS_PER_PIECE {
            vec![Command::FilePieceAck {
                done: false,
                file_id,
                piece,
            }]
        } else {
            Vec::new()
        }
    }

    fn finish(&mut self, last_piece: u32) -> Vec<Command> {
        let Some(download) = self.download.take() else {
            return Vec::new();
        };
        let FileAnnouncement {
            file_type,
            size,
            file_id,
        } = download.file;

        let mut data: Vec<u8> = download.chunks.into_values().flatten().collect();
        data.truncate(size as usize);
        self.photos.push(Photo {
            file_id,
            file_type,
            data,
        });
        self.finished = Some((file_id, size));

        vec![
            Command::FilePieceAck {
                done: true,
                file_id,
                piece: last_piece,
            },
            Command::FileDone { file_id, size },
        ]
    }

    /// Whether a file is partly received.
    pub fn in_progress(&self) -> bool {
        self.download.is_some()
    }

    /// Completed pictures not yet taken.
    pub fn photos(&self) -> &[Photo] {
        &self.photos
    }

    /// Hand over the completed pictures.
    pub fn take_photos(&mut self) -> Vec<Photo> {
        std::mem::take(&mut self.photos)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(file_id: u16, piece: u32, chunk: u32, data: &[u8]) -> FileChunk {
        FileChunk {
            file_id,
            piece,
            chunk,
            data: data.to_vec(),
        }
    }

    fn announce(file_id: u16, size: u32) -> FileAnnouncement {
        FileAnnouncement {
            file_type: 1,
            size,
            file_id,
        }
    }

    #[test]
    fn parse_announcement() {
        let file = FileAnnouncement::parse(&[1, 0x10, 0x27, 0, 0, 0x05, 0x00]).unwrap();
        assert_eq!(file, announce(5, 10_000));
        assert!(FileAnnouncement::parse(&[1, 2, 3]).is_err());
    }

    #[test]
    fn parse_chunk() {
        let mut payload = vec![0x05, 0x00, 2, 0, 0, 0, 17, 0, 0, 0, 3, 0];
        payload.extend_from_slice(&[0xff, 0xd8, 0xff, 0x00]);
        let parsed = FileChunk::parse(&payload).unwrap();
        assert_eq!(parsed, chunk(5, 2, 17, &[0xff, 0xd8, 0xff]));

        // Declared length runs past the payload.
        payload[10] = 9;
        assert!(matches!(
            FileChunk::parse(&payload),
            Err(Error::ShortPayload { needed: 21, actual: 16, .. })
        ));
    }

    #[test]
    fn assembles_over_two_pieces() {
        let mut photos = PhotoAssembler::new();
        assert_eq!(photos.announce(announce(7, 18)), vec![Command::FileSizeAck]);

        for n in 0..7 {
            assert!(photos.chunk(chunk(7, 0, n, &[n as u8, n as u8])).is_empty());
        }
        assert_eq!(
            photos.chunk(chunk(7, 0, 7, &[7, 7])),
            vec![Command::FilePieceAck {
                done: false,
                file_id: 7,
                piece: 0
            }]
        );
        assert!(photos.in_progress());

        assert_eq!(
            photos.chunk(chunk(7, 1, 8, &[8, 8])),
            vec![
                Command::FilePieceAck {
                    done: true,
                    file_id: 7,
                    piece: 1
                },
                Command::FileDone { file_id: 7, size: 18 },
            ]
        );
        assert!(!photos.in_progress());

        let done = photos.take_photos();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].data, vec![0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8]);
        assert!(photos.photos().is_empty());
    }

    #[test]
    fn out_of_order_and_repeated_chunks() {
        let mut photos = PhotoAssembler::new();
        photos.announce(announce(3, 4));

        assert!(photos.chunk(chunk(3, 0, 1, &[3, 4])).is_empty());
        assert!(photos.chunk(chunk(3, 0, 1, &[3, 4])).is_empty());
        assert_eq!(photos.chunk(chunk(3, 0, 0, &[1, 2])).len(), 2);
        assert_eq!(photos.photos()[0].data, vec![1, 2, 3, 4]);

        // The drone missed our FileDone and sends the last chunk again.
        assert_eq!(
            photos.chunk(chunk(3, 0, 0, &[1, 2])),
            vec![
                Command::FilePieceAck {
                    done: true,
                    file_id: 3,
                    piece: 0
                },
                Command::FileDone { file_id: 3, size: 4 },
            ]
        );
        assert_eq!(photos.photos().len(), 1);
    }

    #[test]
    fn stray_chunks_ignored() {
        let mut photos = PhotoAssembler::new();
        assert!(photos.chunk(chunk(1, 0, 0, &[1])).is_empty());

        photos.announce(announce(2, 10));
        assert!(photos.chunk(chunk(9, 0, 0, &[1])).is_empty());
        assert!(photos.in_progress());
    }

    #[test]
    fn new_file_abandons_old() {
        let mut photos = PhotoAssembler::new();
        photos.announce(announce(1, 4));
        photos.chunk(chunk(1, 0, 0, &[1, 2]));

        // A repeated announcement keeps what arrived.
        photos.announce(announce(1, 4));
        assert_eq!(photos.chunk(chunk(1, 0, 1, &[3, 4])).len(), 2);

        photos.announce(announce(2, 2));
        photos.announce(announce(3, 2));
        assert!(photos.chunk(chunk(2, 0, 0, &[1, 2])).is_empty());
        assert_eq!(photos.chunk(chunk(3, 0, 0, &[5, 6])).len(), 2);
        assert_eq!(photos.photos().len(), 2);
    }
}
