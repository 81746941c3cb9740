//! 单个查询的执行协调
//!
//! `SqlQueryExecution` 驱动查询依次经过分析、分布式规划与根阶段启动，
//! 并负责把取消与失败传播到已绑定的阶段树。每个阶段开始前都会重新检查
//! 查询是否已结束，取消最多浪费一个正在进行的阶段。

use log::{debug, info};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use super::aggregator::StageResultAggregator;
use super::planner::{InputExtractor, PlanNodeIdAllocator, QueryServices, SubPlan};
use super::stage::{StageContext, StageExecution};
use super::state_machine::{QueryStateMachine, StateChangeListener};
use crate::common::{panic_message, ThreadPool};
use crate::core::error::{CoordinatorError, CoordinatorResult};
use crate::core::types::{
    QueryId, QueryInfo, QueryState, Session, StageId, StageInfo, Statement, StatementLimits,
};

/// 根阶段输出缓冲区名
pub const ROOT_OUTPUT_BUFFER_NAME: &str = "out";

pub struct SqlQueryExecution {
    state_machine: Arc<QueryStateMachine>,
    statement: Statement,
    services: QueryServices,
    limits: StatementLimits,
    max_pending_splits_per_node: usize,
    executor: Arc<ThreadPool>,
    /// 根阶段，只绑定一次；未绑定是正常状态
    output_stage: OnceLock<Arc<dyn StageExecution>>,
    /// 查询与根阶段都结束后第一次生成的快照，之后保持不变
    final_query_info: OnceLock<QueryInfo>,
}

impl SqlQueryExecution {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        query_id: QueryId,
        query: String,
        session: Session,
        statement: Statement,
        services: QueryServices,
        limits: StatementLimits,
        max_pending_splits_per_node: usize,
        executor: Arc<ThreadPool>,
    ) -> Self {
        let self_uri = services.location_factory.create_query_location(&query_id);
        let state_machine = Arc::new(QueryStateMachine::new(
            query_id,
            query,
            session,
            self_uri,
            Arc::clone(&executor),
        ));
        Self {
            state_machine,
            statement,
            services,
            limits,
            max_pending_splits_per_node,
            executor,
            output_stage: OnceLock::new(),
            final_query_info: OnceLock::new(),
        }
    }

    pub fn query_id(&self) -> &QueryId {
        self.state_machine.query_id()
    }

    pub fn query_state(&self) -> QueryState {
        self.state_machine.query_state()
    }

    pub fn is_done(&self) -> bool {
        self.state_machine.is_done()
    }

    pub fn failure_cause(&self) -> Option<CoordinatorError> {
        self.state_machine.failure_cause()
    }

    pub fn state_machine(&self) -> &Arc<QueryStateMachine> {
        &self.state_machine
    }

    // ==================== 生命周期 ====================

    /// 启动查询
    ///
    /// 只有第一个调用者会真正执行，其余调用直接返回。过程中的错误全部
    /// 转为 `fail`，不会返回给调用方；panic 在记录失败后继续向上传播。
    pub fn start(&self) {
        match panic::catch_unwind(AssertUnwindSafe(|| self.try_start())) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.fail(e);
            }
            Err(payload) => {
                self.fail(CoordinatorError::internal(format!(
                    "query execution panicked: {}",
                    panic_message(payload.as_ref())
                )));
                panic::resume_unwind(payload);
            }
        }
    }

    fn try_start(&self) -> CoordinatorResult<()> {
        // 1. 进入规划；已被其他调用者启动或已结束则直接返回
        if !self.state_machine.begin_planning() {
            return Ok(());
        }

        // 2. 分析并生成分片树
        let sub_plan = self.analyze_query()?;
        if self.state_machine.is_done() {
            debug!("Query-{}: done during analysis, skipping distribution", self.query_id());
            return Ok(());
        }

        // 3. 分布式规划并绑定根阶段
        self.plan_distribution(sub_plan)?;

        // 4. 进入 STARTING
        if !self.state_machine.starting() {
            return Ok(());
        }

        // 5. 启动根阶段；期间已结束则取消阶段
        let Some(stage) = self.output_stage.get() else {
            return Ok(());
        };
        if self.state_machine.is_done() {
            stage.cancel(true);
            return Ok(());
        }
        stage.add_output_buffer(ROOT_OUTPUT_BUFFER_NAME)?;
        stage.no_more_output_buffers()?;
        stage.start()?;
        info!("Query-{}: output stage {} started", self.query_id(), stage.stage_id());
        Ok(())
    }

    /// 分析、逻辑规划与分片，耗时计入分析时间
    fn analyze_query(&self) -> CoordinatorResult<SubPlan> {
        let analysis_start = Instant::now();
        let session = self.state_machine.session();

        let complexity = self.limits.check(&self.statement)?;
        debug!(
            "Query-{}: statement depth {}, {} nodes",
            self.query_id(),
            complexity.depth,
            complexity.node_count
        );

        let analysis = self.services.analyzer.analyze(&self.statement, session)?;

        let id_allocator = PlanNodeIdAllocator::new();
        let plan = self
            .services
            .logical_planner
            .plan(&analysis, session, &id_allocator)?;
        self.state_machine.set_inputs(InputExtractor::extract(&plan.root));

        let sub_plan = self
            .services
            .distributed_logical_planner
            .create_sub_plans(&plan, &id_allocator)?;

        self.state_machine.record_analysis_time(analysis_start);
        Ok(sub_plan)
    }

    /// 生成分布式执行计划并绑定根阶段
    fn plan_distribution(&self, sub_plan: SubPlan) -> CoordinatorResult<()> {
        let planning_start = Instant::now();
        let session = self.state_machine.session();

        let plan = self
            .services
            .distributed_execution_planner
            .plan(&sub_plan, session)?;

        // 规划期间被取消：丢弃计划，不创建阶段
        if self.state_machine.is_done() {
            debug!("Query-{}: done during distributed planning, discarding plan", self.query_id());
            return Ok(());
        }

        self.state_machine.set_output_field_names(plan.field_names.clone());

        let context = StageContext {
            query_id: self.query_id().clone(),
            session: session.clone(),
            max_pending_splits_per_node: self.max_pending_splits_per_node,
            executor: Arc::clone(&self.executor),
        };
        let stage = self
            .services
            .stage_execution_factory
            .create_stage_execution(plan, context)?;

        if self.output_stage.set(Arc::clone(&stage)).is_err() {
            return Err(CoordinatorError::internal(format!(
                "output stage already bound for query {}",
                self.query_id()
            )));
        }

        let aggregator = StageResultAggregator::new(Arc::clone(&self.state_machine));
        let listener_aggregator = aggregator.clone();
        stage.add_state_change_listener(Arc::new(move |stage_info: StageInfo| {
            listener_aggregator.update_state(&stage_info);
        }));
        // 阶段可能在注册监听器之前就已结束
        aggregator.update_state(&stage.stage_info());

        self.state_machine.record_distributed_planning_time(planning_start);

        // 绑定前并发的 cancel/fail 看不到阶段，由这里补上
        if matches!(self.query_state(), QueryState::Canceled | QueryState::Failed) {
            stage.cancel(true);
        }
        Ok(())
    }

    // ==================== 取消传播 ====================

    /// 取消查询，并中断已绑定的阶段树
    pub fn cancel(&self) {
        self.state_machine.cancel();
        self.cancel_output_stage();
    }

    /// 以给定原因使查询失败，并中断已绑定的阶段树
    pub fn fail(&self, cause: CoordinatorError) {
        self.state_machine.fail(cause);
        self.cancel_output_stage();
    }

    /// 取消某个阶段，不直接改变查询状态
    ///
    /// 阶段状态的变化只通过聚合器反映到查询上。不属于本查询或不在当前
    /// 阶段树中的阶段被忽略。
    pub fn cancel_stage(&self, stage_id: &StageId) {
        if stage_id.query_id() != self.query_id() {
            debug!(
                "Query-{}: ignoring cancel for stage {} of another query",
                self.query_id(),
                stage_id
            );
            return;
        }
        let Some(stage) = self.output_stage.get() else {
            return;
        };
        if stage.stage_info().find_stage(stage_id).is_none() {
            debug!(
                "Query-{}: stage {} not found in stage tree",
                self.query_id(),
                stage_id
            );
            return;
        }
        stage.cancel_stage(stage_id);
    }

    fn cancel_output_stage(&self) {
        if let Some(stage) = self.output_stage.get() {
            stage.cancel(true);
        }
    }

    // ==================== 观察 ====================

    /// 阻塞直到状态变化或超时，返回剩余的等待时间
    pub fn wait_for_state_change(&self, current_state: QueryState, max_wait: Duration) -> Duration {
        self.state_machine.wait_for_state_change(current_state, max_wait)
    }

    pub fn add_state_change_listener(&self, listener: StateChangeListener<QueryState>) {
        self.state_machine.add_state_change_listener(listener);
    }

    pub fn record_heartbeat(&self) {
        self.state_machine.record_heartbeat();
    }

    pub fn time_since_last_heartbeat(&self) -> Duration {
        self.state_machine.time_since_last_heartbeat()
    }

    /// 查询快照
    ///
    /// 查询结束且根阶段也已结束（或从未绑定）后，第一份快照会被固定下来，
    /// 之后的调用都返回它。查询已结束但根阶段尚未结束时返回实时快照。
    pub fn get_query_info(&self) -> QueryInfo {
        if let Some(info) = self.final_query_info.get() {
            return info.clone();
        }

        let info = self.state_machine.get_query_info(self.output_stage_info());
        if !info.is_done() {
            return info;
        }

        // 结束状态不再变化，重新读取阶段快照，得到结束之后的阶段树
        let final_info = self.state_machine.get_query_info(self.output_stage_info());
        let stage_done = final_info
            .output_stage
            .as_ref()
            .map_or(true, |stage| stage.state.is_done());
        if !stage_done {
            // cancel()/fail() 先提交状态再取消阶段，此时阶段树还会变化
            return final_info;
        }
        self.final_query_info.get_or_init(|| final_info).clone()
    }

    fn output_stage_info(&self) -> Option<StageInfo> {
        self.output_stage.get().map(|stage| stage.stage_info())
    }
}
