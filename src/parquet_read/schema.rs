use crate::parquet::col_type::{ColumnType, LogicalType, PhysicalType, TimeUnit};
use crate::parquet::error::{fmt_err, ParquetResult};

pub type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Repetition {
    Required,
    Optional,
    Repeated,
}

/// One entry of the flattened, depth-first schema list stored in the footer.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaElement {
    pub name: String,
    pub repetition: Repetition,
    /// `None` for groups.
    pub physical_type: Option<PhysicalType>,
    pub logical_type: Option<LogicalType>,
    pub num_children: usize,
    pub field_id: Option<i32>,
}

impl SchemaElement {
    pub fn group(name: impl Into<String>, repetition: Repetition, num_children: usize) -> Self {
        Self {
            name: name.into(),
            repetition,
            physical_type: None,
            logical_type: None,
            num_children,
            field_id: None,
        }
    }

    pub fn leaf(
        name: impl Into<String>,
        repetition: Repetition,
        physical_type: PhysicalType,
        logical_type: Option<LogicalType>,
    ) -> Self {
        Self {
            name: name.into(),
            repetition,
            physical_type: Some(physical_type),
            logical_type,
            num_children: 0,
            field_id: None,
        }
    }
}

impl TryFrom<parquet_format_safe::SchemaElement> for SchemaElement {
    type Error = crate::parquet::error::ParquetError;

    fn try_from(element: parquet_format_safe::SchemaElement) -> ParquetResult<Self> {
        use parquet_format_safe::FieldRepetitionType as Rep;
        use parquet_format_safe::Type;

        let repetition = match element.repetition_type {
            None | Some(Rep::REQUIRED) => Repetition::Required,
            Some(Rep::OPTIONAL) => Repetition::Optional,
            Some(Rep::REPEATED) => Repetition::Repeated,
            Some(other) => {
                return Err(fmt_err!(
                    MalformedFile,
                    "unknown repetition {} for field {:?}",
                    other.0,
                    element.name
                ))
            }
        };
        let num_children = match element.num_children {
            None => 0,
            Some(n) => usize::try_from(n).map_err(|_| {
                fmt_err!(MalformedFile, "field {:?} has {} children", element.name, n)
            })?,
        };
        let physical_type = match (num_children, element.type_) {
            (0, Some(Type::BOOLEAN)) => Some(PhysicalType::Boolean),
            (0, Some(Type::INT32)) => Some(PhysicalType::Int32),
            (0, Some(Type::INT64)) => Some(PhysicalType::Int64),
            (0, Some(Type::INT96)) => Some(PhysicalType::Int96),
            (0, Some(Type::FLOAT)) => Some(PhysicalType::Float),
            (0, Some(Type::DOUBLE)) => Some(PhysicalType::Double),
            (0, Some(Type::BYTE_ARRAY)) => Some(PhysicalType::ByteArray),
            (0, Some(Type::FIXED_LEN_BYTE_ARRAY)) => {
                let len = element.type_length.unwrap_or(-1);
                let len = usize::try_from(len).map_err(|_| {
                    fmt_err!(
                        MalformedFile,
                        "fixed length field {:?} has length {}",
                        element.name,
                        len
                    )
                })?;
                Some(PhysicalType::FixedLenByteArray(len))
            }
            (0, Some(other)) => {
                return Err(fmt_err!(
                    MalformedFile,
                    "unknown physical type {} for field {:?}",
                    other.0,
                    element.name
                ))
            }
            _ => None,
        };
        let logical_type = match element.logical_type {
            Some(logical) => Some(logical_type(logical)),
            None => element
                .converted_type
                .and_then(|c| converted_type(c, element.scale, element.precision)),
        };
        Ok(Self {
            name: element.name,
            repetition,
            physical_type,
            logical_type,
            num_children,
            field_id: element.field_id,
        })
    }
}

fn time_unit(unit: &parquet_format_safe::TimeUnit) -> TimeUnit {
    use parquet_format_safe::TimeUnit as Unit;
    match unit {
        Unit::MILLIS(_) => TimeUnit::Millis,
        Unit::MICROS(_) => TimeUnit::Micros,
        Unit::NANOS(_) => TimeUnit::Nanos,
    }
}

fn logical_type(logical: parquet_format_safe::LogicalType) -> LogicalType {
    use parquet_format_safe::LogicalType as Logical;
    match logical {
        Logical::STRING(_) => LogicalType::String,
        Logical::ENUM(_) => LogicalType::Enum,
        Logical::JSON(_) => LogicalType::Json,
        Logical::BSON(_) => LogicalType::Bson,
        Logical::UUID(_) => LogicalType::Uuid,
        Logical::DATE(_) => LogicalType::Date,
        Logical::TIME(t) => LogicalType::Time {
            unit: time_unit(&t.unit),
            utc: t.is_adjusted_to_u_t_c,
        },
        Logical::TIMESTAMP(t) => LogicalType::Timestamp {
            unit: time_unit(&t.unit),
            utc: t.is_adjusted_to_u_t_c,
        },
        Logical::INTEGER(i) => LogicalType::Integer {
            bit_width: i.bit_width as u8,
            signed: i.is_signed,
        },
        Logical::DECIMAL(d) => LogicalType::Decimal {
            scale: d.scale,
            precision: d.precision,
        },
        Logical::LIST(_) => LogicalType::List,
        Logical::MAP(_) => LogicalType::Map,
        #[allow(unreachable_patterns)]
        _ => LogicalType::Unknown,
    }
}

fn converted_type(
    converted: parquet_format_safe::ConvertedType,
    scale: Option<i32>,
    precision: Option<i32>,
) -> Option<LogicalType> {
    use parquet_format_safe::ConvertedType as Converted;
    let integer = |bit_width, signed| LogicalType::Integer { bit_width, signed };
    let logical = match converted {
        Converted::UTF8 => LogicalType::String,
        Converted::ENUM => LogicalType::Enum,
        Converted::JSON => LogicalType::Json,
        Converted::BSON => LogicalType::Bson,
        Converted::DATE => LogicalType::Date,
        Converted::TIME_MILLIS => LogicalType::Time {
            unit: TimeUnit::Millis,
            utc: true,
        },
        Converted::TIME_MICROS => LogicalType::Time {
            unit: TimeUnit::Micros,
            utc: true,
        },
        Converted::TIMESTAMP_MILLIS => LogicalType::Timestamp {
            unit: TimeUnit::Millis,
            utc: true,
        },
        Converted::TIMESTAMP_MICROS => LogicalType::Timestamp {
            unit: TimeUnit::Micros,
            utc: true,
        },
        Converted::UINT_8 => integer(8, false),
        Converted::UINT_16 => integer(16, false),
        Converted::UINT_32 => integer(32, false),
        Converted::UINT_64 => integer(64, false),
        Converted::INT_8 => integer(8, true),
        Converted::INT_16 => integer(16, true),
        Converted::INT_32 => integer(32, true),
        Converted::INT_64 => integer(64, true),
        Converted::DECIMAL => LogicalType::Decimal {
            scale: scale.unwrap_or(0),
            precision: precision.unwrap_or(0),
        },
        Converted::LIST => LogicalType::List,
        Converted::MAP | Converted::MAP_KEY_VALUE => LogicalType::Map,
        _ => return None,
    };
    Some(logical)
}

#[derive(Debug, Clone)]
pub struct SchemaNode {
    pub id: NodeId,
    /// `None` only for the root.
    pub parent: Option<NodeId>,
    pub element: SchemaElement,
    pub children: Vec<NodeId>,
    pub max_def_level: u16,
    pub max_rep_level: u16,
}

impl SchemaNode {
    pub fn name(&self) -> &str {
        &self.element.name
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty() && self.element.physical_type.is_some()
    }

    pub fn repetition(&self) -> Repetition {
        self.element.repetition
    }

    pub fn column_type(&self) -> ParquetResult<ColumnType> {
        let physical = self.element.physical_type.ok_or_else(|| {
            fmt_err!(MalformedFile, "field {:?} is a group, not a column", self.name())
        })?;
        ColumnType::resolve(physical, self.element.logical_type)
    }
}

/// The schema as a tree, with each node's level maxima accumulated from the
/// root. Nodes live in an arena and refer to each other by [`NodeId`].
#[derive(Debug, Clone)]
pub struct SchemaTree {
    nodes: Vec<SchemaNode>,
}

impl SchemaTree {
    pub const ROOT: NodeId = 0;

    /// Builds the tree from the depth-first element list, root first.
    pub fn from_elements(elements: Vec<SchemaElement>) -> ParquetResult<Self> {
        let mut elements = elements.into_iter();
        let root = elements
            .next()
            .ok_or_else(|| fmt_err!(MalformedFile, "schema has no elements"))?;
        let mut nodes = Vec::with_capacity(elements.len() + 1);
        // (group, children still to attach)
        let mut open: Vec<(NodeId, usize)> = Vec::new();
        if root.num_children > 0 {
            open.push((Self::ROOT, root.num_children));
        }
        nodes.push(SchemaNode {
            id: Self::ROOT,
            parent: None,
            element: root,
            children: Vec::new(),
            max_def_level: 0,
            max_rep_level: 0,
        });

        for element in elements {
            let Some((parent, remaining)) = open.last_mut() else {
                return Err(fmt_err!(
                    MalformedFile,
                    "schema element {:?} does not belong to any group",
                    element.name
                ));
            };
            let parent = *parent;
            *remaining -= 1;
            if *remaining == 0 {
                open.pop();
            }

            let (mut def, mut rep) = (nodes[parent].max_def_level, nodes[parent].max_rep_level);
            match element.repetition {
                Repetition::Required => {}
                Repetition::Optional => def += 1,
                Repetition::Repeated => {
                    def += 1;
                    rep += 1;
                }
            }
            let id = nodes.len();
            if element.num_children > 0 {
                open.push((id, element.num_children));
            }
            nodes[parent].children.push(id);
            nodes.push(SchemaNode {
                id,
                parent: Some(parent),
                element,
                children: Vec::new(),
                max_def_level: def,
                max_rep_level: rep,
            });
        }

        if let Some((group, remaining)) = open.last() {
            return Err(fmt_err!(
                MalformedFile,
                "schema ended with {} children of {:?} missing",
                remaining,
                nodes[*group].name()
            ));
        }
        Ok(Self { nodes })
    }

    pub fn root(&self) -> &SchemaNode {
        &self.nodes[Self::ROOT]
    }

    pub fn node(&self, id: NodeId) -> &SchemaNode {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn child(&self, id: NodeId, name: &str) -> Option<&SchemaNode> {
        self.nodes[id]
            .children
            .iter()
            .map(|c| &self.nodes[*c])
            .find(|c| c.name() == name)
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &SchemaNode> + '_ {
        self.nodes[id].children.iter().map(|c| &self.nodes[*c])
    }

    /// Resolves a path of field names below the root.
    pub fn get<S: AsRef<str>>(&self, path: &[S]) -> Option<&SchemaNode> {
        let mut node = self.root();
        for name in path {
            node = self.child(node.id, name.as_ref())?;
        }
        Some(node)
    }

    /// Field names from below the root down to `id`.
    pub fn path(&self, id: NodeId) -> Vec<String> {
        let mut path = Vec::new();
        let mut current = &self.nodes[id];
        while let Some(parent) = current.parent {
            path.push(current.name().to_string());
            current = &self.nodes[parent];
        }
        path.reverse();
        path
    }

    /// Leaf nodes in schema order, which is the column chunk order.
    pub fn leaves(&self) -> impl Iterator<Item = &SchemaNode> + '_ {
        self.nodes.iter().filter(|n| n.is_leaf())
    }
}
