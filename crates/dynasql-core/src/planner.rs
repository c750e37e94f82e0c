//! Statement planning.
//!
//! Binds an AST against a table descriptor and produces a typed store
//! request: access-path selection (point get, keyed query, or scan),
//! key/filter predicate classification, placeholder binding, and expression
//! rendering through the shared substitution tables.

use std::collections::HashMap;

use tracing::debug;

use dynasql_model::AttributeValue;
use dynasql_model::input::{
    CreateTableInput, GetItemInput, PutItemInput, QueryInput, ScanInput,
};
use dynasql_model::types::{
    AttributeDefinition, BillingMode, GlobalSecondaryIndex, KeySchemaElement, KeyType,
    LocalSecondaryIndex, Projection, ProjectionType, ProvisionedThroughput, ReturnValue,
    ScalarAttributeType,
};

use crate::ast::{
    AttrType, CompareOp, Condition, ConditionRhs, CreateTable, CreateTableEntry, Insert,
    InsertRow, KeyRole, Operand, ProjectionExpression, ProjectionSpec, Returning, Select,
    Statement, ThroughputDecl, Value,
};
use crate::bind::{Binder, Params};
use crate::error::{EncodeError, Error, PlanError, SchemaError};
use crate::schema::{IndexDescriptor, IndexKind, TableDescriptor};
use crate::serializer::{ExprRenderer, Substitutions, encode_json_object};

/// A compiled request ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanRequest {
    /// Point read by full primary key.
    GetItem(GetItemInput),
    /// Keyed read against the base table or an index.
    Query(QueryInput),
    /// Full traversal with optional filter.
    Scan(ScanInput),
    /// One put per insert row, in listed order.
    Put(Vec<PutItemInput>),
    /// Table creation.
    CreateTable(CreateTableInput),
}

/// The compiled request plus non-fatal planning notes.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    /// The request to dispatch.
    pub request: PlanRequest,
    /// Non-fatal observations, e.g. a key predicate demoted to the filter.
    pub notes: Vec<String>,
}

impl Plan {
    /// Whether dispatching this plan yields rows.
    #[must_use]
    pub fn produces_rows(&self) -> bool {
        matches!(
            self.request,
            PlanRequest::GetItem(_) | PlanRequest::Query(_) | PlanRequest::Scan(_)
        )
    }
}

/// The table a statement targets, when it targets one.
#[must_use]
pub fn target_table(statement: &Statement) -> Option<&str> {
    match statement {
        Statement::Select(sel) => Some(&sel.from),
        Statement::Insert(ins) | Statement::Replace(ins) => Some(&ins.into),
        Statement::CreateTable(_) => None,
    }
}

// ---------------------------------------------------------------------------
// SELECT
// ---------------------------------------------------------------------------

/// The key attributes of the chosen access path.
#[derive(Debug, Clone, Copy)]
struct PathKeys<'a> {
    index: Option<&'a str>,
    partition: &'a str,
    sort: Option<&'a str>,
}

impl<'a> PathKeys<'a> {
    fn base(table: &'a TableDescriptor) -> Self {
        Self {
            index: None,
            partition: &table.partition.name,
            sort: table.sort.as_ref().map(|s| s.name.as_str()),
        }
    }

    fn index(idx: &'a IndexDescriptor) -> Self {
        Self {
            index: Some(&idx.name),
            partition: &idx.partition,
            sort: idx.sort.as_deref(),
        }
    }
}

/// Compile a `SELECT` against a table descriptor.
///
/// # Errors
///
/// `SchemaError` on a `USE INDEX` miss, `PlanError` on direction/limit rule
/// violations, `BindError` on parameter mismatches, `EncodeError` on key
/// type conflicts.
pub fn plan_select(
    select: &Select,
    table: &TableDescriptor,
    params: Params,
) -> Result<Plan, Error> {
    let conjuncts = select
        .where_clause
        .as_ref()
        .map_or(&[][..], |w| w.and.as_slice());
    let limit = parse_limit(select.limit.as_deref())?;

    // Access-path selection: a forced index wins; otherwise the first path
    // whose partition key has an equality conjunct, in stable order (base
    // table, GSIs in declared order, LSIs).
    let forced = match &select.index {
        Some(name) => Some(table.index(name).ok_or_else(|| SchemaError::IndexNotFound {
            table: table.name.clone(),
            index: name.clone(),
        })?),
        None => None,
    };

    let keyed_path = if let Some(idx) = forced {
        has_partition_equality(conjuncts, &idx.partition).then(|| PathKeys::index(idx))
    } else if has_partition_equality(conjuncts, &table.partition.name) {
        Some(PathKeys::base(table))
    } else {
        table
            .indexes
            .iter()
            .filter(|idx| idx.kind == IndexKind::Global)
            .chain(table.indexes.iter().filter(|idx| idx.kind == IndexKind::Local))
            .find(|idx| has_partition_equality(conjuncts, &idx.partition))
            .map(PathKeys::index)
    };

    let Some(path) = keyed_path else {
        // No usable key equality anywhere: full scan (on the forced index
        // when one was named).
        if select.descending == Some(true) {
            return Err(PlanError::DescendingScan.into());
        }
        return plan_scan(select, table, forced, conjuncts, limit, params);
    };

    // Point get: base-table path, every primary-key attribute pinned by
    // exactly one equality, nothing left over. A zero limit stays on the
    // query path so the driver can short-circuit without a store call.
    if forced.is_none() && path.index.is_none() && limit != Some(0) {
        if let Some(pairs) = point_get_pairs(conjuncts, table) {
            return plan_get_item(select, table, &pairs, params);
        }
    }

    plan_query(select, table, path, conjuncts, limit, params)
}

fn plan_get_item(
    select: &Select,
    table: &TableDescriptor,
    pairs: &[(&str, &Value)],
    params: Params,
) -> Result<Plan, Error> {
    let mut subs = Substitutions::new();
    let mut binder = Binder::new(params);

    let projection_expression = render_projection(&select.projection, &mut subs, &mut binder)?;

    let mut key = HashMap::new();
    for (attr, value) in pairs {
        let encoded = binder.resolve(value)?;
        check_key_type(table, attr, &encoded)?;
        key.insert((*attr).to_owned(), encoded);
    }
    binder.finish()?;

    let (expression_attribute_names, _) = subs.into_tables();
    debug!(table = %table.name, mode = "GetItem", "planned statement");
    Ok(Plan {
        request: PlanRequest::GetItem(GetItemInput {
            table_name: table.name.clone(),
            key,
            projection_expression,
            expression_attribute_names,
        }),
        notes: Vec::new(),
    })
}

fn plan_query(
    select: &Select,
    table: &TableDescriptor,
    path: PathKeys<'_>,
    conjuncts: &[Condition],
    limit: Option<i32>,
    params: Params,
) -> Result<Plan, Error> {
    let mut subs = Substitutions::new();
    let mut binder = Binder::new(params);
    let mut notes = Vec::new();

    let projection_expression = render_projection(&select.projection, &mut subs, &mut binder)?;

    let mut key_parts = Vec::new();
    let mut filter_parts = Vec::new();
    let mut have_partition = false;
    let mut have_sort = false;

    for cond in conjuncts {
        let mut renderer = ExprRenderer {
            subs: &mut subs,
            binder: &mut binder,
        };
        match classify(cond, path, have_partition, have_sort) {
            Class::PartitionKey => {
                have_partition = true;
                key_parts.push(render_key_condition(&mut renderer, cond, table)?);
            }
            Class::SortKey => {
                have_sort = true;
                key_parts.push(render_key_condition(&mut renderer, cond, table)?);
            }
            Class::DemotedKey(attr) => {
                notes.push(format!(
                    "predicate on key attribute {attr} evaluated as filter"
                ));
                filter_parts.push(renderer.render_condition(cond)?);
            }
            Class::Filter => {
                filter_parts.push(renderer.render_condition(cond)?);
            }
        }
    }
    binder.finish()?;

    let (expression_attribute_names, expression_attribute_values) = subs.into_tables();
    debug!(
        table = %table.name,
        index = path.index.unwrap_or_default(),
        mode = "Query",
        "planned statement"
    );
    Ok(Plan {
        request: PlanRequest::Query(QueryInput {
            table_name: table.name.clone(),
            index_name: path.index.map(ToOwned::to_owned),
            key_condition_expression: Some(key_parts.join(" AND ")),
            filter_expression: join_nonempty(filter_parts),
            projection_expression,
            expression_attribute_names,
            expression_attribute_values,
            scan_index_forward: select.descending.map(|desc| !desc),
            limit,
            exclusive_start_key: HashMap::new(),
        }),
        notes,
    })
}

fn plan_scan(
    select: &Select,
    table: &TableDescriptor,
    forced: Option<&IndexDescriptor>,
    conjuncts: &[Condition],
    limit: Option<i32>,
    params: Params,
) -> Result<Plan, Error> {
    let mut subs = Substitutions::new();
    let mut binder = Binder::new(params);

    let projection_expression = render_projection(&select.projection, &mut subs, &mut binder)?;

    let mut renderer = ExprRenderer {
        subs: &mut subs,
        binder: &mut binder,
    };
    let filter_parts: Vec<String> = conjuncts
        .iter()
        .map(|cond| renderer.render_condition(cond))
        .collect::<Result<_, _>>()?;
    binder.finish()?;

    let (expression_attribute_names, expression_attribute_values) = subs.into_tables();
    debug!(table = %table.name, mode = "Scan", "planned statement");
    Ok(Plan {
        request: PlanRequest::Scan(ScanInput {
            table_name: table.name.clone(),
            index_name: forced.map(|idx| idx.name.clone()),
            filter_expression: join_nonempty(filter_parts),
            projection_expression,
            expression_attribute_names,
            expression_attribute_values,
            limit,
            exclusive_start_key: HashMap::new(),
        }),
        notes: Vec::new(),
    })
}

// ---------------------------------------------------------------------------
// Predicate classification
// ---------------------------------------------------------------------------

enum Class<'a> {
    PartitionKey,
    SortKey,
    DemotedKey(&'a str),
    Filter,
}

fn classify<'a>(
    cond: &'a Condition,
    path: PathKeys<'_>,
    have_partition: bool,
    have_sort: bool,
) -> Class<'a> {
    if !have_partition && equality_on(cond, path.partition).is_some() {
        return Class::PartitionKey;
    }
    if let Some(sort) = path.sort {
        if !have_sort && is_sort_key_predicate(cond, sort) {
            return Class::SortKey;
        }
    }
    match key_attr_referenced(cond, path) {
        Some(attr) => Class::DemotedKey(attr),
        None => Class::Filter,
    }
}

/// The bound value of `attr = <value>` when `cond` has exactly that shape.
fn equality_on<'a>(cond: &'a Condition, attr: &str) -> Option<&'a Value> {
    let Condition::Operand { path, rhs } = cond else {
        return None;
    };
    if path.as_top_level_name()? != attr {
        return None;
    }
    match rhs {
        ConditionRhs::Compare {
            op: CompareOp::Eq,
            operand: Operand::Value(value),
        } => Some(value),
        _ => None,
    }
}

fn has_partition_equality(conjuncts: &[Condition], attr: &str) -> bool {
    conjuncts.iter().any(|cond| equality_on(cond, attr).is_some())
}

/// Sort-key predicates legal in a key condition: `=`, `<`, `<=`, `>`, `>=`,
/// `BETWEEN`, and `begins_with(sort, ...)`, all against plain values.
fn is_sort_key_predicate(cond: &Condition, sort: &str) -> bool {
    match cond {
        Condition::Operand { path, rhs } => {
            if path.as_top_level_name() != Some(sort) {
                return false;
            }
            match rhs {
                ConditionRhs::Compare {
                    op: CompareOp::Eq | CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge,
                    operand: Operand::Value(_),
                } => true,
                ConditionRhs::Between {
                    low: Operand::Value(_),
                    high: Operand::Value(_),
                } => true,
                _ => false,
            }
        }
        Condition::Function(function) => {
            function.name == "begins_with"
                && function
                    .first_arg_path()
                    .and_then(crate::ast::DocumentPath::as_top_level_name)
                    == Some(sort)
        }
        _ => false,
    }
}

/// The key attribute a conjunct touches, when it touches one in a shape the
/// key condition cannot carry.
fn key_attr_referenced<'a>(cond: &'a Condition, path: PathKeys<'_>) -> Option<&'a str> {
    let is_key = |name: &str| name == path.partition || path.sort == Some(name);
    match cond {
        Condition::Operand { path: lhs, .. } => {
            lhs.as_top_level_name().filter(|name| is_key(name))
        }
        Condition::Function(function) | Condition::FunctionOperand { function, .. } => function
            .first_arg_path()
            .and_then(crate::ast::DocumentPath::as_top_level_name)
            .filter(|name| is_key(name)),
        _ => None,
    }
}

/// Point-get key pairs: one equality per primary-key attribute and nothing
/// else in the conjunction.
fn point_get_pairs<'a>(
    conjuncts: &'a [Condition],
    table: &'a TableDescriptor,
) -> Option<Vec<(&'a str, &'a Value)>> {
    let mut key_attrs = vec![table.partition.name.as_str()];
    if let Some(sort) = &table.sort {
        key_attrs.push(sort.name.as_str());
    }
    if conjuncts.len() != key_attrs.len() {
        return None;
    }
    let mut pairs = Vec::with_capacity(key_attrs.len());
    for attr in key_attrs {
        let matches: Vec<&Value> = conjuncts
            .iter()
            .filter_map(|cond| equality_on(cond, attr))
            .collect();
        let [value] = matches.as_slice() else {
            return None;
        };
        pairs.push((attr, *value));
    }
    Some(pairs)
}

// ---------------------------------------------------------------------------
// Rendering helpers
// ---------------------------------------------------------------------------

fn render_projection(
    projection: &ProjectionExpression,
    subs: &mut Substitutions,
    binder: &mut Binder,
) -> Result<Option<String>, Error> {
    match projection {
        ProjectionExpression::All => Ok(None),
        ProjectionExpression::Columns(columns) => {
            let mut renderer = ExprRenderer { subs, binder };
            renderer.render_projection(columns).map(Some)
        }
    }
}

/// Render a key-condition conjunct, type-checking values against the
/// descriptor's declared key types.
fn render_key_condition(
    renderer: &mut ExprRenderer<'_>,
    cond: &Condition,
    table: &TableDescriptor,
) -> Result<String, Error> {
    match cond {
        Condition::Operand { path, rhs } => {
            let attr = path
                .as_top_level_name()
                .unwrap_or_default()
                .to_owned();
            let lhs = renderer.render_path(path);
            match rhs {
                ConditionRhs::Compare {
                    op,
                    operand: Operand::Value(value),
                } => {
                    let encoded = renderer.binder.resolve(value)?;
                    check_key_type(table, &attr, &encoded)?;
                    let slot = renderer.subs.value_alias(encoded);
                    Ok(format!("{lhs} {op} {slot}"))
                }
                ConditionRhs::Between {
                    low: Operand::Value(low),
                    high: Operand::Value(high),
                } => {
                    let low = renderer.binder.resolve(low)?;
                    check_key_type(table, &attr, &low)?;
                    let high = renderer.binder.resolve(high)?;
                    check_key_type(table, &attr, &high)?;
                    let low_slot = renderer.subs.value_alias(low);
                    let high_slot = renderer.subs.value_alias(high);
                    Ok(format!("{lhs} BETWEEN {low_slot} AND {high_slot}"))
                }
                // Classification only routes value shapes here.
                _ => renderer.render_condition(cond),
            }
        }
        _ => renderer.render_condition(cond),
    }
}

/// Reject values whose wire type conflicts with a declared key type.
fn check_key_type(
    table: &TableDescriptor,
    attr: &str,
    value: &AttributeValue,
) -> Result<(), EncodeError> {
    let Some(expected) = table.declared_type(attr) else {
        return Ok(());
    };
    match value.scalar_type() {
        Some(actual) if actual == expected => Ok(()),
        _ => Err(EncodeError::KeyTypeConflict {
            attribute: attr.to_owned(),
            expected,
            actual: value.type_descriptor(),
        }),
    }
}

fn parse_limit(limit: Option<&str>) -> Result<Option<i32>, PlanError> {
    let Some(text) = limit else {
        return Ok(None);
    };
    text.parse::<i32>()
        .ok()
        .filter(|n| *n >= 0)
        .map(Some)
        .ok_or_else(|| PlanError::InvalidLimit {
            value: text.to_owned(),
        })
}

fn join_nonempty(parts: Vec<String>) -> Option<String> {
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" AND "))
    }
}

// ---------------------------------------------------------------------------
// INSERT / REPLACE
// ---------------------------------------------------------------------------

/// Compile an `INSERT` or `REPLACE` body into one put per row.
///
/// # Errors
///
/// `EncodeError` when a row is not a document or a key attribute conflicts
/// with its declared type; `BindError` on parameter mismatches.
pub fn plan_insert(
    insert: &Insert,
    table: &TableDescriptor,
    params: Params,
) -> Result<Plan, Error> {
    let mut binder = Binder::new(params);
    let return_values = match insert.returning {
        Some(Returning::AllOld) => Some(ReturnValue::AllOld),
        _ => None,
    };

    let mut puts = Vec::with_capacity(insert.rows.len());
    for row in &insert.rows {
        let item = match row {
            InsertRow::Object(object) => encode_json_object(object),
            InsertRow::Value(value @ (Value::Named(_) | Value::Positional)) => {
                match binder.resolve(value)? {
                    AttributeValue::M(item) => item,
                    _ => return Err(EncodeError::RowNotDocument.into()),
                }
            }
            InsertRow::Value(_) => return Err(EncodeError::RowNotDocument.into()),
        };

        for (attr, value) in &item {
            if *attr == table.partition.name
                || table.sort.as_ref().is_some_and(|s| s.name == *attr)
            {
                check_key_type(table, attr, value)?;
            }
        }

        puts.push(PutItemInput {
            table_name: table.name.clone(),
            item,
            return_values,
        });
    }
    binder.finish()?;

    debug!(table = %table.name, rows = puts.len(), mode = "PutItem", "planned statement");
    Ok(Plan {
        request: PlanRequest::Put(puts),
        notes: Vec::new(),
    })
}

// ---------------------------------------------------------------------------
// CREATE TABLE
// ---------------------------------------------------------------------------

/// Compile a `CREATE TABLE` definition into a creation request.
///
/// # Errors
///
/// `PlanError` on key/throughput rule violations.
pub fn plan_create_table(create: &CreateTable) -> Result<Plan, Error> {
    let mut declared: Vec<(&str, ScalarAttributeType)> = Vec::new();
    let mut partition: Option<&str> = None;
    let mut sort: Option<&str> = None;
    let mut throughput: Option<&ThroughputDecl> = None;
    let mut gsis = Vec::new();
    let mut lsis = Vec::new();

    for entry in &create.entries {
        match entry {
            CreateTableEntry::Attr(attr) => {
                declared.push((&attr.name, scalar_type(attr.attr_type)));
                match attr.key {
                    Some(KeyRole::Hash) => {
                        if partition.replace(&attr.name).is_some() {
                            return Err(PlanError::DuplicateHashKey.into());
                        }
                    }
                    Some(KeyRole::Range) => {
                        if sort.replace(&attr.name).is_some() {
                            return Err(PlanError::DuplicateRangeKey.into());
                        }
                    }
                    None => {}
                }
            }
            CreateTableEntry::Gsi(gsi) => gsis.push(gsi),
            CreateTableEntry::Lsi(lsi) => lsis.push(lsi),
            CreateTableEntry::Throughput(decl) => {
                if throughput.replace(decl).is_some() {
                    return Err(PlanError::DuplicateThroughput.into());
                }
            }
        }
    }

    let partition = partition.ok_or(PlanError::MissingHashKey)?;

    // Attribute definitions cover exactly the attributes used in some key
    // schema, in declaration order.
    let mut keyed: Vec<&str> = vec![partition];
    keyed.extend(sort);
    for gsi in &gsis {
        keyed.push(&gsi.partition);
        keyed.extend(gsi.sort.as_deref());
    }
    for lsi in &lsis {
        keyed.push(&lsi.sort);
    }
    let declared_type = |attr: &str| {
        declared
            .iter()
            .find(|(name, _)| *name == attr)
            .map(|(_, ty)| *ty)
    };
    let mut attribute_definitions = Vec::new();
    for (name, ty) in &declared {
        if keyed.contains(name)
            && !attribute_definitions
                .iter()
                .any(|d: &AttributeDefinition| d.attribute_name == *name)
        {
            attribute_definitions.push(AttributeDefinition {
                attribute_name: (*name).to_owned(),
                attribute_type: *ty,
            });
        }
    }

    let mut key_schema = vec![key_element(partition, KeyType::Hash)];
    if let Some(sort) = sort {
        key_schema.push(key_element(sort, KeyType::Range));
    }

    let global_secondary_indexes = gsis
        .iter()
        .map(|gsi| {
            require_declared(&declared_type, &gsi.partition, &gsi.name)?;
            if let Some(sort) = &gsi.sort {
                require_declared(&declared_type, sort, &gsi.name)?;
            }
            let mut key_schema = vec![key_element(&gsi.partition, KeyType::Hash)];
            if let Some(sort) = &gsi.sort {
                key_schema.push(key_element(sort, KeyType::Range));
            }
            Ok(GlobalSecondaryIndex {
                index_name: gsi.name.clone(),
                key_schema,
                projection: projection_model(&gsi.projection),
                provisioned_throughput: gsi.throughput.as_ref().map(throughput_model),
            })
        })
        .collect::<Result<Vec<_>, Error>>()?;

    let local_secondary_indexes = lsis
        .iter()
        .map(|lsi| {
            require_declared(&declared_type, &lsi.sort, &lsi.name)?;
            Ok(LocalSecondaryIndex {
                index_name: lsi.name.clone(),
                key_schema: vec![
                    key_element(partition, KeyType::Hash),
                    key_element(&lsi.sort, KeyType::Range),
                ],
                projection: projection_model(&lsi.projection),
            })
        })
        .collect::<Result<Vec<_>, Error>>()?;

    debug!(table = %create.table, mode = "CreateTable", "planned statement");
    Ok(Plan {
        request: PlanRequest::CreateTable(CreateTableInput {
            table_name: create.table.clone(),
            key_schema,
            attribute_definitions,
            billing_mode: Some(if throughput.is_some() {
                BillingMode::Provisioned
            } else {
                BillingMode::PayPerRequest
            }),
            provisioned_throughput: throughput.map(throughput_model),
            global_secondary_indexes,
            local_secondary_indexes,
        }),
        notes: Vec::new(),
    })
}

fn scalar_type(attr_type: AttrType) -> ScalarAttributeType {
    match attr_type {
        AttrType::String => ScalarAttributeType::S,
        AttrType::Number => ScalarAttributeType::N,
        AttrType::Binary => ScalarAttributeType::B,
    }
}

fn key_element(attr: &str, key_type: KeyType) -> KeySchemaElement {
    KeySchemaElement {
        attribute_name: attr.to_owned(),
        key_type,
    }
}

fn require_declared(
    declared_type: &impl Fn(&str) -> Option<ScalarAttributeType>,
    attr: &str,
    index: &str,
) -> Result<(), Error> {
    if declared_type(attr).is_some() {
        Ok(())
    } else {
        Err(PlanError::UndeclaredIndexKey {
            attribute: attr.to_owned(),
            index: index.to_owned(),
        }
        .into())
    }
}

fn projection_model(spec: &ProjectionSpec) -> Projection {
    match spec {
        ProjectionSpec::KeysOnly => Projection {
            projection_type: Some(ProjectionType::KeysOnly),
            non_key_attributes: Vec::new(),
        },
        ProjectionSpec::All => Projection {
            projection_type: Some(ProjectionType::All),
            non_key_attributes: Vec::new(),
        },
        ProjectionSpec::Include(attrs) => Projection {
            projection_type: Some(ProjectionType::Include),
            non_key_attributes: attrs.clone(),
        },
    }
}

fn throughput_model(decl: &ThroughputDecl) -> ProvisionedThroughput {
    ProvisionedThroughput {
        read_capacity_units: decl.read_units,
        write_capacity_units: decl.write_units,
    }
}
