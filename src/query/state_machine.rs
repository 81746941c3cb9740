//! 查询状态机
//!
//! 所有状态转换都经由同一把锁与条件变量串行化。转换是 O(1) 的，持锁期间
//! 不做任何外部调用；监听器在释放锁之后、在共享线程池上异步调用，
//! 因此监听器可以安全地重入状态机。
//!
//! 转换函数永不失败，只返回本次调用是否完成了转换。返回 false 表示
//! 状态机已越过该点（并发调用方抢先，或查询已结束），调用方应停止推进。

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use parking_lot::{Condvar, Mutex};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::common::{panic_message, ThreadPool};
use crate::core::error::CoordinatorError;
use crate::core::types::{
    Failure, Input, QueryId, QueryInfo, QueryState, QueryStats, Session, StageInfo,
};

/// 状态变化监听器
pub type StateChangeListener<T> = Arc<dyn Fn(T) + Send + Sync>;

/// 只写一次的时间点：单调时钟 + 对外展示的墙钟
#[derive(Debug, Clone, Copy)]
struct Timestamp {
    instant: Instant,
    wall: DateTime<Utc>,
}

impl Timestamp {
    fn now() -> Self {
        Self {
            instant: Instant::now(),
            wall: Utc::now(),
        }
    }
}

struct StateMachineInner {
    state: QueryState,
    failure_cause: Option<CoordinatorError>,
    inputs: Vec<Input>,
    field_names: Vec<String>,
    listeners: Vec<StateChangeListener<QueryState>>,
    last_heartbeat: Timestamp,
    analysis_time: Option<Duration>,
    distributed_planning_time: Option<Duration>,
    execution_start: Option<Timestamp>,
    end: Option<Timestamp>,
}

pub struct QueryStateMachine {
    query_id: QueryId,
    query: String,
    session: Session,
    self_uri: String,
    created: Timestamp,
    inner: Mutex<StateMachineInner>,
    state_changed: Condvar,
    executor: Arc<ThreadPool>,
}

impl QueryStateMachine {
    pub fn new(
        query_id: QueryId,
        query: impl Into<String>,
        session: Session,
        self_uri: impl Into<String>,
        executor: Arc<ThreadPool>,
    ) -> Self {
        let created = Timestamp::now();
        Self {
            query_id,
            query: query.into(),
            session,
            self_uri: self_uri.into(),
            created,
            inner: Mutex::new(StateMachineInner {
                state: QueryState::Queued,
                failure_cause: None,
                inputs: Vec::new(),
                field_names: Vec::new(),
                listeners: Vec::new(),
                last_heartbeat: created,
                analysis_time: None,
                distributed_planning_time: None,
                execution_start: None,
                end: None,
            }),
            state_changed: Condvar::new(),
            executor,
        }
    }

    pub fn query_id(&self) -> &QueryId {
        &self.query_id
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn query_state(&self) -> QueryState {
        self.inner.lock().state
    }

    pub fn is_done(&self) -> bool {
        self.query_state().is_done()
    }

    /// 第一次失败的原因
    pub fn failure_cause(&self) -> Option<CoordinatorError> {
        self.inner.lock().failure_cause.clone()
    }

    // ==================== 状态转换 ====================

    pub fn begin_planning(&self) -> bool {
        self.transition(|state| state == QueryState::Queued, QueryState::Planning, None)
    }

    pub fn starting(&self) -> bool {
        self.transition(|state| state == QueryState::Planning, QueryState::Starting, None)
    }

    pub fn running(&self) -> bool {
        self.transition(|state| state == QueryState::Starting, QueryState::Running, None)
    }

    /// 转为完成；尚未开始规划的查询不能直接完成
    pub fn finished(&self) -> bool {
        self.transition(
            |state| !state.is_done() && state != QueryState::Queued,
            QueryState::Finished,
            None,
        )
    }

    pub fn cancel(&self) -> bool {
        self.transition(|state| !state.is_done(), QueryState::Canceled, None)
    }

    /// 转为失败；只保存第一次成功失败的原因
    pub fn fail(&self, cause: CoordinatorError) -> bool {
        let failed = self.transition(|state| !state.is_done(), QueryState::Failed, Some(cause.clone()));
        if !failed {
            debug!("Query-{}: ignoring failure after completion: {}", self.query_id, cause);
        }
        failed
    }

    fn transition<F>(&self, allowed: F, new_state: QueryState, cause: Option<CoordinatorError>) -> bool
    where
        F: Fn(QueryState) -> bool,
    {
        let (old_state, listeners) = {
            let mut inner = self.inner.lock();
            if !allowed(inner.state) {
                return false;
            }
            let old_state = inner.state;
            inner.state = new_state;
            if cause.is_some() {
                inner.failure_cause = cause;
            }
            if new_state.is_done() {
                inner.end = Some(Timestamp::now());
            }
            self.state_changed.notify_all();
            (old_state, inner.listeners.clone())
        };

        match new_state {
            QueryState::Failed => warn!(
                "Query-{}: {} -> {} ({})",
                self.query_id,
                old_state,
                new_state,
                self.failure_cause().map(|c| c.to_string()).unwrap_or_default()
            ),
            _ => info!("Query-{}: {} -> {}", self.query_id, old_state, new_state),
        }
        metrics::counter!("querycoord_query_transitions_total", "state" => new_state.as_str()).increment(1);

        self.fire_state_changed(listeners, new_state);
        true
    }

    // ==================== 监听器 ====================

    /// 注册监听器，之后每次提交的转换都会异步调用一次
    pub fn add_state_change_listener(&self, listener: StateChangeListener<QueryState>) {
        self.inner.lock().listeners.push(listener);
    }

    fn fire_state_changed(&self, listeners: Vec<StateChangeListener<QueryState>>, state: QueryState) {
        for listener in listeners {
            let query_id = self.query_id.clone();
            let task_listener = Arc::clone(&listener);
            let task_query_id = query_id.clone();
            let submitted = self
                .executor
                .execute(move || invoke_listener(&task_query_id, &task_listener, state));
            if !submitted {
                // 线程池已关闭，就地调用，保证通知不丢失
                invoke_listener(&query_id, &listener, state);
            }
        }
    }

    // ==================== 等待 ====================

    /// 阻塞直到状态不同于 `current_state` 或超时，返回剩余的等待时间
    ///
    /// 先检查再等待都在同一把锁下完成，调用前已经发生的转换不会被错过。
    pub fn wait_for_state_change(&self, current_state: QueryState, max_wait: Duration) -> Duration {
        let deadline = Instant::now().checked_add(max_wait);
        let mut inner = self.inner.lock();
        while inner.state == current_state {
            match deadline {
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        return Duration::ZERO;
                    }
                    self.state_changed.wait_until(&mut inner, deadline);
                }
                None => self.state_changed.wait(&mut inner),
            }
        }
        deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .unwrap_or(max_wait)
    }

    // ==================== 计时 ====================

    /// 心跳可重复记录，保留最新一次
    pub fn record_heartbeat(&self) {
        self.inner.lock().last_heartbeat = Timestamp::now();
    }

    /// 距离上次心跳的时间
    pub fn time_since_last_heartbeat(&self) -> Duration {
        self.inner.lock().last_heartbeat.instant.elapsed()
    }

    /// 记录分析耗时，只接受第一次写入
    pub fn record_analysis_time(&self, analysis_start: Instant) -> bool {
        let mut inner = self.inner.lock();
        if inner.analysis_time.is_some() {
            return false;
        }
        inner.analysis_time = Some(analysis_start.elapsed());
        true
    }

    /// 记录分布式规划耗时，只接受第一次写入
    pub fn record_distributed_planning_time(&self, planning_start: Instant) -> bool {
        let mut inner = self.inner.lock();
        if inner.distributed_planning_time.is_some() {
            return false;
        }
        inner.distributed_planning_time = Some(planning_start.elapsed());
        true
    }

    /// 记录执行开始时刻，只接受第一次写入
    pub fn record_execution_start(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.execution_start.is_some() {
            return false;
        }
        inner.execution_start = Some(Timestamp::now());
        true
    }

    // ==================== 规划结果 ====================

    pub fn set_inputs(&self, inputs: Vec<Input>) {
        self.inner.lock().inputs = inputs;
    }

    pub fn set_output_field_names(&self, field_names: Vec<String>) {
        self.inner.lock().field_names = field_names;
    }

    // ==================== 快照 ====================

    /// 构造查询快照
    ///
    /// 状态、失败原因与计时在同一次加锁中读取。
    pub fn get_query_info(&self, output_stage: Option<StageInfo>) -> QueryInfo {
        let inner = self.inner.lock();
        let created = self.created.instant;
        let now = Instant::now();

        let elapsed_time = inner
            .end
            .map(|end| end.instant.duration_since(created))
            .unwrap_or_else(|| now.duration_since(created));
        let queued_time = inner
            .execution_start
            .or(inner.end)
            .map(|ts| ts.instant.duration_since(created))
            .unwrap_or_else(|| now.duration_since(created));

        let query_stats = QueryStats {
            create_time: self.created.wall,
            execution_start_time: inner.execution_start.map(|ts| ts.wall),
            last_heartbeat: inner.last_heartbeat.wall,
            end_time: inner.end.map(|ts| ts.wall),
            elapsed_time,
            queued_time,
            analysis_time: inner.analysis_time,
            distributed_planning_time: inner.distributed_planning_time,
            execution_start_offset: inner
                .execution_start
                .map(|ts| ts.instant.duration_since(created)),
            total_tasks: 0,
            running_tasks: 0,
            completed_tasks: 0,
            failed_tasks: 0,
        }
        .with_task_counts(output_stage.as_ref());

        QueryInfo {
            query_id: self.query_id.clone(),
            session: self.session.clone(),
            state: inner.state,
            self_uri: self.self_uri.clone(),
            query: self.query.clone(),
            field_names: inner.field_names.clone(),
            inputs: inner.inputs.clone(),
            query_stats,
            output_stage,
            failure_info: inner.failure_cause.as_ref().map(Failure::from_error),
        }
    }
}

fn invoke_listener(query_id: &QueryId, listener: &StateChangeListener<QueryState>, state: QueryState) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| listener(state)));
    if let Err(payload) = result {
        metrics::counter!("querycoord_listener_failures_total").increment(1);
        error!(
            "Query-{}: state change listener panicked on {}: {}",
            query_id,
            state,
            panic_message(payload.as_ref())
        );
    }
}
