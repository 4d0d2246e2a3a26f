// SPDX-License-Identifier: MIT OR Apache-2.0
//! Rigging node types.
//!
//! Every type is a static [`NodeTypeInfo`] registered by
//! [`builtin_registry`], plus a typed wrapper generated with
//! [`network_node!`](rigforge_graph::network_node).
//!
//! ```text
//! Core
//! └─ CharacterCore
//!    ├─ JointsCore ─► joints
//!    ├─ RegionsCore ─► RigMarkupProperty
//!    ├─ MeshesCore
//!    ├─ ExportCore ─► ExportDefinition, assets
//!    └─ RigCore
//!       ├─ ComponentCore ─► Rigging/Control/Skeleton/AttachmentJoints
//!       └─ AddonCore ─► AddonControls, OverDrivenControl
//! ```

pub mod property;

pub use property::{add_property, find_properties, find_property, remove_properties};

use rigforge_graph::{network_node, AttrSpec, AttrType, NodeTypeInfo, NodeTypeRegistry, CORE_TYPE};

/// Attribute names shared by the rigging layer
pub mod attr {
    /// Character display name
    pub const CHARACTER_NAME: &str = "character_name";
    /// Root folder for exports
    pub const ROOT_PATH: &str = "root_path";
    /// Sub folders under the root path
    pub const SUB_PATHS: &str = "sub_paths";
    /// Control color set
    pub const COLOR_SET: &str = "color_set";
    /// Root joint, as a node ID
    pub const ROOT_JOINT_ID: &str = "root_joint_id";

    /// Component or addon kind
    pub const COMPONENT_TYPE: &str = "component_type";
    /// Body side
    pub const SIDE: &str = "side";
    /// Region name
    pub const REGION: &str = "region";
    /// Parent space object ID, empty for world
    pub const PARENT_SPACE: &str = "parent_space";
    /// Component group object ID
    pub const GROUP_ID: &str = "group_id";
    /// What an addon drives from
    pub const TARGET_TYPE: &str = "target_type";
    /// Driver IDs joined by `,`, or `world`
    pub const TARGET_DATA: &str = "target_data";

    /// Export definition name
    pub const DEFINITION_NAME: &str = "definition_name";
    /// First exported frame
    pub const START_FRAME: &str = "start_frame";
    /// Last exported frame
    pub const END_FRAME: &str = "end_frame";
    /// Export the playback range instead of the stored frames
    pub const USE_SCENE_RANGE: &str = "use_scene_range";

    /// Control role
    pub const CONTROL_TYPE: &str = "control_type";
    /// Position in the component's control list
    pub const ORDERED_INDEX: &str = "ordered_index";
    /// Rest translation of a control
    pub const ZERO_TRANSLATE: &str = "zero_translate";
    /// Rest rotation of a control
    pub const ZERO_ROTATE: &str = "zero_rotate";
    /// Control is locked against edits
    pub const LOCKED: &str = "locked";

    /// Markup role: `root`, `end` or `exclude`
    pub const TAG: &str = "tag";
    /// Markup created for a single build and removed with it
    pub const TEMPORARY: &str = "temporary";

    /// Whether a joint is exported
    pub const EXPORT: &str = "export";
    /// Asset file name
    pub const ASSET_NAME: &str = "asset_name";
    /// Asset export folder
    pub const EXPORT_PATH: &str = "export_path";
    /// Stage a stage property runs in
    pub const EXPORT_STAGE: &str = "export_stage";
    /// Higher runs first
    pub const PRIORITY: &str = "priority";

    /// Bind pose translation stored on joints
    pub const BIND_TRANSLATE: &str = "bind_translate";
    /// Bind pose rotation stored on joints
    pub const BIND_ROTATE: &str = "bind_rotate";
    /// Bind pose scale stored on joints
    pub const BIND_SCALE: &str = "bind_scale";

    /// Object a saved curve drove, as a node ID
    pub const SAVED_TARGET: &str = "saved_target";
    /// Channel a saved curve drove
    pub const SAVED_CHANNEL: &str = "saved_channel";
}

const CHARACTER_ATTRS: &[AttrSpec] = &[
    AttrSpec::new(attr::CHARACTER_NAME, AttrType::String),
    AttrSpec::new(attr::ROOT_PATH, AttrType::String),
    AttrSpec::new(attr::SUB_PATHS, AttrType::String),
    AttrSpec::new(attr::COLOR_SET, AttrType::String),
    AttrSpec::new(attr::ROOT_JOINT_ID, AttrType::String),
];

const JOINTS_ATTRS: &[AttrSpec] = &[AttrSpec::new(attr::ROOT_JOINT_ID, AttrType::String)];

const COMPONENT_ATTRS: &[AttrSpec] = &[
    AttrSpec::new(attr::COMPONENT_TYPE, AttrType::String),
    AttrSpec::new(attr::SIDE, AttrType::String),
    AttrSpec::new(attr::REGION, AttrType::String),
    AttrSpec::new(attr::PARENT_SPACE, AttrType::String),
    AttrSpec::new(attr::GROUP_ID, AttrType::String),
];

const ADDON_ATTRS: &[AttrSpec] = &[
    AttrSpec::new(attr::COMPONENT_TYPE, AttrType::String),
    AttrSpec::new(attr::TARGET_TYPE, AttrType::String),
    AttrSpec::new(attr::TARGET_DATA, AttrType::String),
    AttrSpec::new(attr::GROUP_ID, AttrType::String),
];

const DEFINITION_ATTRS: &[AttrSpec] = &[
    AttrSpec::new(attr::DEFINITION_NAME, AttrType::String),
    AttrSpec::new(attr::START_FRAME, AttrType::Int),
    AttrSpec::new(attr::END_FRAME, AttrType::Int),
    AttrSpec::new(attr::USE_SCENE_RANGE, AttrType::Bool),
];

const CONTROL_ATTRS: &[AttrSpec] = &[
    AttrSpec::new(attr::CONTROL_TYPE, AttrType::String),
    AttrSpec::new(attr::ORDERED_INDEX, AttrType::Int),
    AttrSpec::new(attr::ZERO_TRANSLATE, AttrType::Vector3),
    AttrSpec::new(attr::ZERO_ROTATE, AttrType::Vector3),
    AttrSpec::new(attr::LOCKED, AttrType::Bool),
];

const MARKUP_ATTRS: &[AttrSpec] = &[
    AttrSpec::new(attr::SIDE, AttrType::String),
    AttrSpec::new(attr::REGION, AttrType::String),
    AttrSpec::new(attr::TAG, AttrType::String),
    AttrSpec::new(attr::TEMPORARY, AttrType::Bool),
];

const EXPORT_ATTRS: &[AttrSpec] = &[AttrSpec::new(attr::EXPORT, AttrType::Bool)];

const ASSET_ATTRS: &[AttrSpec] = &[
    AttrSpec::new(attr::ASSET_NAME, AttrType::String),
    AttrSpec::new(attr::EXPORT_PATH, AttrType::String),
];

const STAGE_ATTRS: &[AttrSpec] = &[
    AttrSpec::new(attr::EXPORT_STAGE, AttrType::String),
    AttrSpec::new(attr::PRIORITY, AttrType::Int),
];

const fn dependent(name: &'static str, ancestor: &'static str) -> NodeTypeInfo {
    NodeTypeInfo::new(name)
        .with_base("DependentNode")
        .depends_on(ancestor)
}

/// Every rigging node type, supertypes before subtypes
pub const BUILTIN_TYPES: &[NodeTypeInfo] = &[
    NodeTypeInfo::new("MetaNode"),
    NodeTypeInfo::new("DependentNode").with_base("MetaNode"),
    NodeTypeInfo::new(CORE_TYPE).with_base("MetaNode"),
    dependent("CharacterCore", CORE_TYPE).with_attributes(CHARACTER_ATTRS),
    dependent("JointsCore", "CharacterCore").with_attributes(JOINTS_ATTRS),
    dependent("RegionsCore", "CharacterCore"),
    dependent("MeshesCore", "CharacterCore"),
    dependent("RigCore", "CharacterCore"),
    dependent("ComponentCore", "RigCore").with_attributes(COMPONENT_ATTRS),
    dependent("RiggingJoints", "ComponentCore"),
    dependent("ControlJoints", "ComponentCore"),
    dependent("SkeletonJoints", "ComponentCore"),
    dependent("AttachmentJoints", "ComponentCore"),
    dependent("AddonCore", "RigCore").with_attributes(ADDON_ATTRS),
    dependent("AddonControls", "AddonCore"),
    dependent("OverDrivenControl", "AddonCore"),
    dependent("ExportCore", "CharacterCore"),
    dependent("ExportDefinition", "ExportCore").with_attributes(DEFINITION_ATTRS),
    NodeTypeInfo::new("MetaProperty").with_base("MetaNode"),
    NodeTypeInfo::new("ControlProperty")
        .with_base("MetaProperty")
        .with_attributes(CONTROL_ATTRS),
    NodeTypeInfo::new("RigMarkupProperty")
        .with_base("MetaProperty")
        .with_attributes(MARKUP_ATTRS),
    NodeTypeInfo::new("ExportProperty")
        .with_base("MetaProperty")
        .with_attributes(EXPORT_ATTRS),
    NodeTypeInfo::new("ExportAssetProperty")
        .with_base("MetaProperty")
        .with_attributes(ASSET_ATTRS),
    NodeTypeInfo::new("CharacterAnimationAsset").with_base("ExportAssetProperty"),
    NodeTypeInfo::new("ExportStageProperty")
        .with_base("MetaProperty")
        .with_attributes(STAGE_ATTRS),
    NodeTypeInfo::new("ZeroCharacterProperty").with_base("ExportStageProperty"),
    NodeTypeInfo::new("RemoveRootAnimationProperty").with_base("ExportStageProperty"),
    NodeTypeInfo::new("StartAtZeroProperty").with_base("ExportStageProperty"),
];

/// Registry holding every rigging node type
pub fn builtin_registry() -> NodeTypeRegistry {
    let mut registry = NodeTypeRegistry::new();
    for info in BUILTIN_TYPES {
        registry.register(*info);
    }
    registry
}

network_node! {
    /// Graph root
    pub Core => "Core"
}

network_node! {
    /// Root of one characterized skeleton
    pub CharacterCore => "CharacterCore"
}

network_node! {
    /// Owns every joint of a character
    pub JointsCore => "JointsCore"
}

network_node! {
    /// Owns a character's region markup
    pub RegionsCore => "RegionsCore"
}

network_node! {
    /// Owns a character's meshes
    pub MeshesCore => "MeshesCore"
}

network_node! {
    /// Owns a character's components and addons
    pub RigCore => "RigCore"
}

network_node! {
    /// One rig component
    pub ComponentCore => "ComponentCore"
}

network_node! {
    /// Duplicated joints the controls drive
    pub RiggingJoints => "RiggingJoints"
}

network_node! {
    /// Animator-facing controls
    pub ControlJoints => "ControlJoints"
}

network_node! {
    /// Skeleton joints the component drives, plus saved curves
    pub SkeletonJoints => "SkeletonJoints"
}

network_node! {
    /// Objects other components may attach to
    pub AttachmentJoints => "AttachmentJoints"
}

network_node! {
    /// One addon on a control
    pub AddonCore => "AddonCore"
}

network_node! {
    /// Controls created by an addon
    pub AddonControls => "AddonControls"
}

network_node! {
    /// The control an addon overrides
    pub OverDrivenControl => "OverDrivenControl"
}

network_node! {
    /// Owns export definitions and assets
    pub ExportCore => "ExportCore"
}

network_node! {
    /// Named frame range to export
    pub ExportDefinition => "ExportDefinition"
}

network_node! {
    /// Marks an object as a rig control
    pub ControlProperty => "ControlProperty"
}

network_node! {
    /// Region markup on a joint
    pub RigMarkupProperty => "RigMarkupProperty"
}

network_node! {
    /// Per-joint export toggle
    pub ExportProperty => "ExportProperty"
}

network_node! {
    /// Animation asset exported per definition
    pub CharacterAnimationAsset => "CharacterAnimationAsset"
}

network_node! {
    /// Export stage step
    pub ExportStageProperty => "ExportStageProperty"
}
