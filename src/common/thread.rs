//! 共享工作线程池
//!
//! 由协调器工厂持有，所有查询的分析、规划、监听器回调都提交到这里。
//! 池的生命周期归工厂所有，单个查询不创建线程。

use log::{debug, error};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crate::core::error::{CoordinatorError, CoordinatorResult};

type Job = Box<dyn FnOnce() + Send + 'static>;

struct PoolState {
    tasks: VecDeque<Job>,
    shutdown: bool,
}

struct Shared {
    state: Mutex<PoolState>,
    notifier: Condvar,
    active: AtomicUsize,
    completed: AtomicUsize,
    panicked: AtomicUsize,
}

/// 线程池统计
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub threads: usize,
    pub active: usize,
    pub queued: usize,
    pub completed: usize,
    pub panicked: usize,
}

/// 命名工作线程池
///
/// 任务中的 panic 被隔离在单个任务内，不会杀死工作线程。
pub struct ThreadPool {
    name: String,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
    shared: Arc<Shared>,
}

impl ThreadPool {
    /// 创建线程池，线程命名为 `<name>-<序号>`
    pub fn new(name: impl Into<String>, size: usize) -> CoordinatorResult<Self> {
        if size == 0 {
            return Err(CoordinatorError::config("thread pool size must be greater than zero"));
        }

        let name = name.into();
        let shared = Arc::new(Shared {
            state: Mutex::new(PoolState {
                tasks: VecDeque::new(),
                shutdown: false,
            }),
            notifier: Condvar::new(),
            active: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            panicked: AtomicUsize::new(0),
        });

        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            let shared = Arc::clone(&shared);
            let handle = thread::Builder::new()
                .name(format!("{}-{}", name, id))
                .spawn(move || worker_loop(shared))
                .map_err(|e| CoordinatorError::internal(format!("failed to spawn worker thread: {}", e)))?;
            workers.push(handle);
        }

        debug!("Thread pool {} started with {} workers", name, size);
        Ok(Self {
            name,
            workers: Mutex::new(workers),
            shared,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 提交任务
    ///
    /// 线程池关闭后提交的任务被丢弃，返回 false。
    pub fn execute<F>(&self, f: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.shared.state.lock();
        if state.shutdown {
            debug!("Thread pool {} is shut down, dropping task", self.name);
            return false;
        }
        state.tasks.push_back(Box::new(f));
        self.shared.notifier.notify_one();
        true
    }

    pub fn len(&self) -> usize {
        self.workers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> PoolStats {
        let queued = self.shared.state.lock().tasks.len();
        PoolStats {
            threads: self.len(),
            active: self.shared.active.load(Ordering::SeqCst),
            queued,
            completed: self.shared.completed.load(Ordering::SeqCst),
            panicked: self.shared.panicked.load(Ordering::SeqCst),
        }
    }

    /// 关闭线程池：已排队的任务仍会执行完，之后工作线程退出
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
        }
        self.shared.notifier.notify_all();
    }

    /// 关闭并等待所有工作线程退出
    pub fn join(&self) {
        self.shutdown();
        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        let current = thread::current().id();
        for handle in workers {
            // 在池内线程上 join 自己会死锁
            if handle.thread().id() == current {
                continue;
            }
            let _ = handle.join();
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.join();
    }
}

fn worker_loop(shared: Arc<Shared>) {
    loop {
        let task = {
            let mut state = shared.state.lock();
            loop {
                if let Some(task) = state.tasks.pop_front() {
                    break Some(task);
                }
                if state.shutdown {
                    break None;
                }
                shared.notifier.wait(&mut state);
            }
        };

        let Some(task) = task else {
            break;
        };

        shared.active.fetch_add(1, Ordering::SeqCst);
        let result = panic::catch_unwind(AssertUnwindSafe(task));
        shared.active.fetch_sub(1, Ordering::SeqCst);
        shared.completed.fetch_add(1, Ordering::SeqCst);

        if let Err(payload) = result {
            shared.panicked.fetch_add(1, Ordering::SeqCst);
            error!(
                "Task panicked on {}: {}",
                thread::current().name().unwrap_or("<unnamed>"),
                panic_message(payload.as_ref())
            );
        }
    }
}

/// 提取 panic 负载中的消息
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
