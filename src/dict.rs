//! The prefix-searchable dictionary of the encoder.
//!
//! A byte trie from sequences to codes. Every node stands for the byte sequence on its path from
//! the root, not every node has a code: the single entry added right after a reset continues a
//! sequence of the previous epoch whose shorter prefixes are not part of the new epoch.
use crate::{Code, ALPHABET};

type NodeId = u32;

/// The root is never the successor of another node.
const NO_NODE: NodeId = 0;
const ROOT: NodeId = 0;

/// Nodes with few successors keep them in this many inline slots searched linearly.
const SHORT: usize = 16;

/// The sequence to code mapping used for longest prefix matching.
pub struct Dictionary {
    nodes: Vec<Node>,
    simples: Vec<Simple>,
    complex: Vec<Full>,
}

/// A position while matching a sequence byte by byte.
#[derive(Clone, Debug)]
pub struct Cursor {
    node: NodeId,
    depth: usize,
    /// Code and length of the longest coded sequence passed so far.
    best: Option<(Code, usize)>,
}

#[derive(Clone, Copy)]
struct Node {
    code: Option<Code>,
    next: Successors,
}

#[derive(Clone, Copy)]
enum Successors {
    None,
    Simple(u32),
    Full(u32),
}

#[derive(Clone, Copy)]
struct Simple {
    nodes: [NodeId; SHORT],
    bytes: [u8; SHORT],
    count: u8,
}

#[derive(Clone, Copy)]
struct Full {
    continuation: [NodeId; ALPHABET],
}

impl Dictionary {
    /// A dictionary holding the single byte sequences.
    pub fn new() -> Self {
        let mut dict = Dictionary {
            nodes: Vec::with_capacity(1 << 16),
            simples: Vec::new(),
            complex: Vec::new(),
        };
        dict.init();
        dict
    }

    fn init(&mut self) {
        // The root leads to the one-byte codes in nodes 1 through 256.
        self.nodes.push(Node {
            code: None,
            next: Successors::Full(0),
        });
        let mut root = Full {
            continuation: [NO_NODE; ALPHABET],
        };
        for byte in 0..ALPHABET {
            root.continuation[byte] = byte as NodeId + 1;
            self.nodes.push(Node {
                code: Some(byte as Code),
                next: Successors::None,
            });
        }
        self.complex.push(root);
    }

    /// Drop everything but the single byte sequences.
    pub fn reset(&mut self) {
        self.simples.clear();
        // Keep the successors of the root.
        self.complex.truncate(1);
        self.nodes.truncate(ALPHABET + 1);
        for node in self.nodes[1..].iter_mut() {
            node.next = Successors::None;
        }
    }

    /// Store `seq` under `code`.
    ///
    /// Missing intermediate nodes are created without a code.
    pub fn insert(&mut self, seq: &[u8], code: Code) {
        let mut node = ROOT;
        for &byte in seq {
            node = match self.successor(node, byte) {
                Some(next) => next,
                None => self.append(node, byte),
            };
        }
        if node != ROOT {
            self.nodes[node as usize].code = Some(code);
        }
    }

    /// The code stored for exactly `seq`.
    pub fn get(&self, seq: &[u8]) -> Option<Code> {
        let mut node = ROOT;
        for &byte in seq {
            node = self.successor(node, byte)?;
        }
        self.nodes[node as usize].code
    }

    /// The code and length of the longest stored sequence that is a prefix of `input`.
    ///
    /// Only `None` for empty input, every byte is a sequence on its own.
    pub fn longest_prefix_of(&self, input: &[u8]) -> Option<(Code, usize)> {
        let mut cursor = Cursor::new();
        for &byte in input {
            if !self.advance(&mut cursor, byte) {
                break;
            }
        }
        cursor.best()
    }

    /// Continue the match of `cursor` with `byte`.
    ///
    /// Returns false, leaving the cursor unchanged, when no stored sequence continues this way.
    pub fn advance(&self, cursor: &mut Cursor, byte: u8) -> bool {
        match self.successor(cursor.node, byte) {
            None => false,
            Some(next) => {
                cursor.node = next;
                cursor.depth += 1;
                if let Some(code) = self.nodes[next as usize].code {
                    cursor.best = Some((code, cursor.depth));
                }
                true
            }
        }
    }

    fn successor(&self, node: NodeId, byte: u8) -> Option<NodeId> {
        match self.nodes[node as usize].next {
            Successors::None => None,
            Successors::Simple(idx) => {
                let nexts = &self.simples[idx as usize];
                let successors = nexts
                    .nodes
                    .iter()
                    .zip(nexts.bytes.iter())
                    .take(usize::from(nexts.count));
                for (&snode, &sbyte) in successors {
                    if sbyte == byte {
                        return Some(snode);
                    }
                }

                None
            }
            Successors::Full(idx) => {
                let full = &self.complex[idx as usize];
                match full.continuation[usize::from(byte)] {
                    NO_NODE => None,
                    next => Some(next),
                }
            }
        }
    }

    /// Add a new node without a code below `node`.
    fn append(&mut self, node: NodeId, byte: u8) -> NodeId {
        let next = self.nodes.len() as NodeId;
        let successors = self.nodes[node as usize].next;
        match successors {
            Successors::None => {
                let mut simple = Simple::default();
                simple.nodes[0] = next;
                simple.bytes[0] = byte;
                simple.count = 1;
                self.nodes[node as usize].next = Successors::Simple(self.simples.len() as u32);
                self.simples.push(simple);
            }
            Successors::Simple(idx) if usize::from(self.simples[idx as usize].count) < SHORT => {
                let nexts = &mut self.simples[idx as usize];
                let nidx = usize::from(nexts.count);
                nexts.bytes[nidx] = byte;
                nexts.nodes[nidx] = next;
                nexts.count += 1;
            }
            Successors::Simple(idx) => {
                let simple = &self.simples[idx as usize];
                let mut full = Full {
                    continuation: [NO_NODE; ALPHABET],
                };
                for (&sbyte, &snode) in simple.bytes.iter().zip(simple.nodes.iter()) {
                    full.continuation[usize::from(sbyte)] = snode;
                }
                full.continuation[usize::from(byte)] = next;
                self.nodes[node as usize].next = Successors::Full(self.complex.len() as u32);
                self.complex.push(full);
            }
            Successors::Full(idx) => {
                self.complex[idx as usize].continuation[usize::from(byte)] = next;
            }
        }
        self.nodes.push(Node {
            code: None,
            next: Successors::None,
        });
        next
    }
}

impl Default for Dictionary {
    fn default() -> Self {
        Dictionary::new()
    }
}

impl Cursor {
    /// A cursor at the empty sequence.
    pub fn new() -> Self {
        Cursor {
            node: ROOT,
            depth: 0,
            best: None,
        }
    }

    /// Number of bytes matched.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The code and length of the longest stored sequence matched so far.
    pub fn best(&self) -> Option<(Code, usize)> {
        self.best
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Cursor::new()
    }
}

impl Default for Simple {
    fn default() -> Self {
        Simple {
            nodes: [NO_NODE; SHORT],
            bytes: [0; SHORT],
            count: 0,
        }
    }
}
