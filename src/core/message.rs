//! 内核消息队列
//!
//! 多生产者 / 单消费者：工作线程与调用线程都可以通过克隆出的 [`MessageSink`] 投递消息，
//! 宿主在任意线程上用 [`MessageHandler`] 取走。队列满时丢弃最旧的一条。
//! 每条消息同时镜像到 `tracing`。

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// 默认队列容量
pub const DEFAULT_MAX_MESSAGES: usize = 10_000;

/// 消息级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
}

impl MessageKind {
    fn prefix(self) -> &'static str {
        match self {
            MessageKind::Debug => "Debug: ",
            MessageKind::Info => "Info: ",
            MessageKind::Warning => "Warning: ",
            MessageKind::Error => "Error: ",
            MessageKind::Fatal => "Fatal error: ",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// 一条内核消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub kind: MessageKind,
    pub text: String,
    pub tag: String,
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.text)
    }
}

/// 各级别计数；入队与出队都在 `gate` 内完成，计数始终等于队列中的条数
#[derive(Debug, Default)]
struct Counters {
    gate: Mutex<()>,
    counts: [AtomicUsize; 5],
}

impl Counters {
    fn of(&self, kind: MessageKind) -> &AtomicUsize {
        &self.counts[kind.index()]
    }
}

/// 消息投递句柄，可廉价克隆并跨线程传递
#[derive(Debug, Clone)]
pub struct MessageSink {
    tx: Sender<Message>,
    // 满队列时用来丢弃最旧消息
    rx: Receiver<Message>,
    counters: Arc<Counters>,
}

impl MessageSink {
    pub fn add(&self, kind: MessageKind, text: impl Into<String>, tag: impl Into<String>) {
        let msg = Message {
            kind,
            text: text.into(),
            tag: tag.into(),
        };
        match kind {
            MessageKind::Debug => debug!(tag = %msg.tag, "{}", msg.text),
            MessageKind::Info => info!(tag = %msg.tag, "{}", msg.text),
            MessageKind::Warning => warn!(tag = %msg.tag, "{}", msg.text),
            MessageKind::Error | MessageKind::Fatal => error!(tag = %msg.tag, "{}", msg.text),
        }
        self.push(msg);
    }

    fn push(&self, msg: Message) {
        let _gate = self.counters.gate.lock();
        if self.tx.is_full() {
            if let Ok(old) = self.rx.try_recv() {
                self.counters.of(old.kind).fetch_sub(1, Ordering::Relaxed);
            }
        }
        let kind = msg.kind;
        // 持有 gate 时队列不会被别人填满；断开时直接丢弃
        if self.tx.try_send(msg).is_ok() {
            self.counters.of(kind).fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn debug(&self, text: impl Into<String>) {
        self.add(MessageKind::Debug, text, "");
    }

    pub fn info(&self, text: impl Into<String>) {
        self.add(MessageKind::Info, text, "");
    }

    pub fn warning(&self, text: impl Into<String>) {
        self.add(MessageKind::Warning, text, "");
    }

    pub fn error(&self, text: impl Into<String>) {
        self.add(MessageKind::Error, text, "");
    }

    pub fn fatal(&self, text: impl Into<String>) {
        self.add(MessageKind::Fatal, text, "");
    }
}

/// 消息队列的消费端
#[derive(Debug)]
pub struct MessageHandler {
    sink: MessageSink,
}

impl Default for MessageHandler {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_MESSAGES)
    }
}

impl MessageHandler {
    pub fn with_capacity(max: usize) -> Self {
        let (tx, rx) = channel::bounded(max.max(1));
        Self {
            sink: MessageSink {
                tx,
                rx,
                counters: Arc::new(Counters::default()),
            },
        }
    }

    /// 取得一个投递句柄
    pub fn sink(&self) -> MessageSink {
        self.sink.clone()
    }

    /// 取出最旧的一条消息
    pub fn next(&self) -> Option<Message> {
        let _gate = self.sink.counters.gate.lock();
        let msg = self.sink.rx.try_recv().ok()?;
        self.sink.counters.of(msg.kind).fetch_sub(1, Ordering::Relaxed);
        Some(msg)
    }

    /// 取出全部排队消息
    pub fn drain(&self) -> Vec<Message> {
        std::iter::from_fn(|| self.next()).collect()
    }

    pub fn clear(&self) {
        while self.next().is_some() {}
    }

    pub fn num_waiting(&self) -> usize {
        self.sink.rx.len()
    }

    pub fn num_of(&self, kind: MessageKind) -> usize {
        self.sink.counters.of(kind).load(Ordering::Relaxed)
    }

    pub fn num_errors(&self) -> usize {
        self.num_of(MessageKind::Error)
    }

    pub fn num_fatals(&self) -> usize {
        self.num_of(MessageKind::Fatal)
    }

    pub fn num_warnings(&self) -> usize {
        self.num_of(MessageKind::Warning)
    }

    pub fn num_infos(&self) -> usize {
        self.num_of(MessageKind::Info)
    }

    pub fn num_debugs(&self) -> usize {
        self.num_of(MessageKind::Debug)
    }
}
