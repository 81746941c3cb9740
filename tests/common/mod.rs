//! 集成测试共享工具模块
//!
//! 提供脚本化的分析器/规划器、可控的阶段执行对象，以及常用的等待与构造函数。

#![allow(dead_code)]

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use querycoord::config::QueryManagerConfig;
use querycoord::core::error::{CoordinatorError, CoordinatorResult, ErrorCode};
use querycoord::core::types::{
    Failure, Input, QueryId, QueryState, Session, StageId, StageInfo, StageState, Statement,
    TaskId, TaskInfo, TaskState,
};
use querycoord::query::planner::{
    Analysis, Analyzer, DistributedExecutionPlanner, DistributedLogicalPlanner, LocationFactory,
    LogicalPlanner, Plan, PlanFragment, PlanNode, PlanNodeIdAllocator, StageExecutionPlan, SubPlan,
};
use querycoord::query::{
    QueryServices, SqlQueryExecution, SqlQueryExecutionFactory, StageContext, StageExecution,
    StageExecutionFactory, StateChangeListener,
};

pub const WAIT: Duration = Duration::from_secs(5);

/// 一次性闸门：被测线程在 `pass` 处阻塞，测试线程确认其到达后再放行
#[derive(Default)]
pub struct Gate {
    state: Mutex<(bool, bool)>,
    changed: Condvar,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn pass(&self) {
        let mut state = self.state.lock();
        state.0 = true;
        self.changed.notify_all();
        while !state.1 {
            self.changed.wait(&mut state);
        }
    }

    pub fn wait_entered(&self) -> bool {
        let deadline = Instant::now() + WAIT;
        let mut state = self.state.lock();
        while !state.0 {
            if self.changed.wait_until(&mut state, deadline).timed_out() {
                return state.0;
            }
        }
        true
    }

    pub fn release(&self) {
        let mut state = self.state.lock();
        state.1 = true;
        self.changed.notify_all();
    }
}

// ==================== 分析与规划 ====================

pub enum AnalyzerScript {
    Succeed,
    Fail(CoordinatorError),
    Panic(&'static str),
    Block(Arc<Gate>),
}

pub struct ScriptedAnalyzer {
    script: AnalyzerScript,
    calls: AtomicUsize,
}

impl ScriptedAnalyzer {
    pub fn new(script: AnalyzerScript) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Analyzer for ScriptedAnalyzer {
    fn analyze(&self, statement: &Statement, _session: &Session) -> CoordinatorResult<Analysis> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            AnalyzerScript::Succeed => {}
            AnalyzerScript::Fail(e) => return Err(e.clone()),
            AnalyzerScript::Panic(msg) => panic!("{}", msg),
            AnalyzerScript::Block(gate) => gate.pass(),
        }
        Ok(Analysis {
            statement_kind: statement.kind.clone(),
            output_names: vec!["orderkey".to_string(), "total".to_string()],
        })
    }
}

pub fn orders_input() -> Input {
    Input::new("hive", "tpch", "orders", vec!["orderkey".to_string(), "totalprice".to_string()])
}

pub fn customer_input() -> Input {
    Input::new("hive", "tpch", "customer", vec!["custkey".to_string()])
}

/// 生成 orders join customer 的逻辑计划
pub struct FakeLogicalPlanner;

impl LogicalPlanner for FakeLogicalPlanner {
    fn plan(
        &self,
        _analysis: &Analysis,
        _session: &Session,
        ids: &PlanNodeIdAllocator,
    ) -> CoordinatorResult<Plan> {
        let root = PlanNode::new(ids.next_id(), "Output").with_source(
            PlanNode::new(ids.next_id(), "Join")
                .with_source(PlanNode::table_scan(ids.next_id(), orders_input()))
                .with_source(PlanNode::table_scan(ids.next_id(), customer_input())),
        );
        Ok(Plan::new(root))
    }
}

pub struct FakeDistributedLogicalPlanner;

impl DistributedLogicalPlanner for FakeDistributedLogicalPlanner {
    fn create_sub_plans(&self, plan: &Plan, _ids: &PlanNodeIdAllocator) -> CoordinatorResult<SubPlan> {
        Ok(SubPlan::new(PlanFragment {
            id: "0".to_string(),
            root: plan.root.clone(),
        }))
    }
}

pub struct FakeDistributedExecutionPlanner {
    gate: Option<Arc<Gate>>,
}

impl FakeDistributedExecutionPlanner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { gate: None })
    }

    pub fn blocking(gate: Arc<Gate>) -> Arc<Self> {
        Arc::new(Self { gate: Some(gate) })
    }
}

impl DistributedExecutionPlanner for FakeDistributedExecutionPlanner {
    fn plan(&self, sub_plan: &SubPlan, _session: &Session) -> CoordinatorResult<StageExecutionPlan> {
        if let Some(gate) = &self.gate {
            gate.pass();
        }
        Ok(StageExecutionPlan::new(
            sub_plan.fragment.clone(),
            vec!["orderkey".to_string(), "total".to_string()],
        ))
    }
}

pub struct FakeLocationFactory;

impl LocationFactory for FakeLocationFactory {
    fn create_query_location(&self, query_id: &QueryId) -> String {
        format!("http://coordinator:8080/v1/query/{}", query_id)
    }
}

// ==================== 阶段执行 ====================

/// 可控的阶段执行对象，记录所有调用，测试通过 `push` 推送快照
pub struct FakeStageExecution {
    stage_id: StageId,
    info: Mutex<StageInfo>,
    listeners: Mutex<Vec<StateChangeListener<StageInfo>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeStageExecution {
    pub fn new(stage_id: StageId, initial: StageInfo) -> Arc<Self> {
        Arc::new(Self {
            stage_id,
            info: Mutex::new(initial),
            listeners: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// 更新快照并同步通知全部监听器
    pub fn push(&self, info: StageInfo) {
        *self.info.lock() = info.clone();
        let listeners = self.listeners.lock().clone();
        for listener in listeners {
            listener(info.clone());
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }
}

impl StageExecution for FakeStageExecution {
    fn stage_id(&self) -> StageId {
        self.stage_id.clone()
    }

    fn add_output_buffer(&self, name: &str) -> CoordinatorResult<()> {
        self.record(format!("add_output_buffer({})", name));
        Ok(())
    }

    fn no_more_output_buffers(&self) -> CoordinatorResult<()> {
        self.record("no_more_output_buffers");
        Ok(())
    }

    fn start(&self) -> CoordinatorResult<()> {
        self.record("start");
        Ok(())
    }

    fn cancel(&self, interrupt: bool) {
        self.record(format!("cancel({})", interrupt));
        let current = self.info.lock().clone();
        if !current.state.is_done() {
            let mut canceled = current;
            canceled.state = StageState::Canceled;
            self.push(canceled);
        }
    }

    fn cancel_stage(&self, stage_id: &StageId) {
        self.record(format!("cancel_stage({})", stage_id));
    }

    fn stage_info(&self) -> StageInfo {
        self.info.lock().clone()
    }

    fn add_state_change_listener(&self, listener: StateChangeListener<StageInfo>) {
        self.listeners.lock().push(listener);
    }
}

pub struct FakeStageFactory {
    initial_state: StageState,
    initial_tasks: usize,
    gate: Option<Arc<Gate>>,
    created: Mutex<Vec<Arc<FakeStageExecution>>>,
    contexts: Mutex<Vec<StageContext>>,
}

impl FakeStageFactory {
    pub fn new() -> Arc<Self> {
        Self::with_initial(StageState::Planned, 0)
    }

    /// 新建的阶段以给定状态与任务数作为初始快照
    pub fn with_initial(state: StageState, tasks: usize) -> Arc<Self> {
        Arc::new(Self {
            initial_state: state,
            initial_tasks: tasks,
            gate: None,
            created: Mutex::new(Vec::new()),
            contexts: Mutex::new(Vec::new()),
        })
    }

    /// 创建阶段前在闸门处阻塞
    pub fn blocking(gate: Arc<Gate>) -> Arc<Self> {
        Arc::new(Self {
            initial_state: StageState::Planned,
            initial_tasks: 0,
            gate: Some(gate),
            created: Mutex::new(Vec::new()),
            contexts: Mutex::new(Vec::new()),
        })
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().len()
    }

    pub fn stage(&self) -> Option<Arc<FakeStageExecution>> {
        self.created.lock().first().cloned()
    }

    pub fn stage_for(&self, stage_id: &StageId) -> Option<Arc<FakeStageExecution>> {
        self.created
            .lock()
            .iter()
            .find(|stage| &stage.stage_id == stage_id)
            .cloned()
    }

    pub fn last_context(&self) -> Option<StageContext> {
        self.contexts.lock().last().cloned()
    }
}

impl StageExecutionFactory for FakeStageFactory {
    fn create_stage_execution(
        &self,
        _plan: StageExecutionPlan,
        context: StageContext,
    ) -> CoordinatorResult<Arc<dyn StageExecution>> {
        if let Some(gate) = &self.gate {
            gate.pass();
        }
        let stage_id = StageId::new(context.query_id.clone(), "0");
        let initial = stage_info(&stage_id, self.initial_state, self.initial_tasks);
        let stage = FakeStageExecution::new(stage_id, initial);
        self.created.lock().push(Arc::clone(&stage));
        self.contexts.lock().push(context);
        Ok(stage)
    }
}

// ==================== 构造 ====================

pub struct Fixture {
    pub analyzer: Arc<ScriptedAnalyzer>,
    pub stage_factory: Arc<FakeStageFactory>,
    pub services: QueryServices,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with(
            ScriptedAnalyzer::new(AnalyzerScript::Succeed),
            FakeDistributedExecutionPlanner::new(),
            FakeStageFactory::new(),
        )
    }

    pub fn with_analyzer(script: AnalyzerScript) -> Self {
        Self::with(
            ScriptedAnalyzer::new(script),
            FakeDistributedExecutionPlanner::new(),
            FakeStageFactory::new(),
        )
    }

    pub fn with(
        analyzer: Arc<ScriptedAnalyzer>,
        distributed_planner: Arc<FakeDistributedExecutionPlanner>,
        stage_factory: Arc<FakeStageFactory>,
    ) -> Self {
        let services = QueryServices {
            analyzer: analyzer.clone(),
            logical_planner: Arc::new(FakeLogicalPlanner),
            distributed_logical_planner: Arc::new(FakeDistributedLogicalPlanner),
            distributed_execution_planner: distributed_planner,
            stage_execution_factory: stage_factory.clone(),
            location_factory: Arc::new(FakeLocationFactory),
        };
        Self {
            analyzer,
            stage_factory,
            services,
        }
    }

    pub fn factory(&self) -> SqlQueryExecutionFactory {
        self.factory_with(test_config())
    }

    pub fn factory_with(&self, config: QueryManagerConfig) -> SqlQueryExecutionFactory {
        SqlQueryExecutionFactory::new(config, self.services.clone()).expect("创建工厂失败")
    }

    /// 创建查询执行对象（未启动）
    pub fn execution(&self, factory: &SqlQueryExecutionFactory) -> Arc<SqlQueryExecution> {
        factory.create_query_execution(QueryId::generate(), "SELECT orderkey, total FROM orders", session(), simple_statement())
    }
}

pub fn test_config() -> QueryManagerConfig {
    QueryManagerConfig {
        executor_threads: 4,
        executor_thread_name: "test-scheduler".to_string(),
        ..QueryManagerConfig::default()
    }
}

pub fn session() -> Session {
    Session::new("alice", "hive", "tpch").with_source("integration-test")
}

pub fn simple_statement() -> Statement {
    Statement::new("Query").with_text("SELECT orderkey, total FROM orders").with_child(
        Statement::new("QuerySpecification")
            .with_child(Statement::new("Select"))
            .with_child(Statement::new("Table")),
    )
}

/// 构造一条深度为 `depth` 的链式语句
pub fn nested_statement(depth: usize) -> Statement {
    let mut statement = Statement::new("Literal");
    for _ in 1..depth {
        statement = Statement::new("Subquery").with_child(statement);
    }
    statement
}

pub fn stage_info(stage_id: &StageId, state: StageState, tasks: usize) -> StageInfo {
    let task_state = match state {
        StageState::Finished => TaskState::Finished,
        StageState::Running => TaskState::Running,
        _ => TaskState::Planned,
    };
    StageInfo::new(stage_id.clone(), state).with_tasks(
        (0..tasks)
            .map(|i| TaskInfo::new(TaskId::new(stage_id.clone(), i.to_string()), task_state))
            .collect(),
    )
}

pub fn task_failure(message: &str) -> Failure {
    Failure::new("RemoteTaskException", message, ErrorCode::RemoteTaskError)
}

/// 等待查询进入指定状态，超时返回 false
pub fn wait_for_state(execution: &SqlQueryExecution, expected: QueryState) -> bool {
    let deadline = Instant::now() + WAIT;
    loop {
        let current = execution.query_state();
        if current == expected {
            return true;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() || current.is_done() {
            return false;
        }
        execution.wait_for_state_change(current, remaining);
    }
}
