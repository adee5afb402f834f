//! Resource type configurations for Oracle Database@AWS
//!
//! This module defines:
//! - The kinds of remote object the provider manages or reads
//! - Mapping between configuration attributes and Cloud Control properties

// =============================================================================
// Resource Kinds
// =============================================================================

/// Every kind of remote object this provider manages or reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    CloudExadataInfrastructure,
    CloudVmCluster,
    CloudAutonomousVmCluster,
    OdbNetwork,
    OdbPeeringConnection,
    DbServer,
    DbNode,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 7] = [
        ResourceKind::CloudExadataInfrastructure,
        ResourceKind::CloudVmCluster,
        ResourceKind::CloudAutonomousVmCluster,
        ResourceKind::OdbNetwork,
        ResourceKind::OdbPeeringConnection,
        ResourceKind::DbServer,
        ResourceKind::DbNode,
    ];

    pub fn config(&self) -> &'static ResourceConfig {
        match self {
            ResourceKind::CloudExadataInfrastructure => &CLOUD_EXADATA_INFRASTRUCTURE_CONFIG,
            ResourceKind::CloudVmCluster => &CLOUD_VM_CLUSTER_CONFIG,
            ResourceKind::CloudAutonomousVmCluster => &CLOUD_AUTONOMOUS_VM_CLUSTER_CONFIG,
            ResourceKind::OdbNetwork => &ODB_NETWORK_CONFIG,
            ResourceKind::OdbPeeringConnection => &ODB_PEERING_CONNECTION_CONFIG,
            ResourceKind::DbServer => &DB_SERVER_CONFIG,
            ResourceKind::DbNode => &DB_NODE_CONFIG,
        }
    }

    /// Look up a kind by its configuration type name (e.g., "odb.network")
    pub fn from_resource_type(resource_type: &str) -> Option<ResourceKind> {
        Self::ALL
            .into_iter()
            .find(|k| k.config().resource_type == resource_type)
    }

    pub fn resource_type(&self) -> &'static str {
        self.config().resource_type
    }

    pub fn is_data_source(&self) -> bool {
        self.config().parent_identifier.is_some()
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.resource_type())
    }
}

// =============================================================================
// Resource Configuration
// =============================================================================

/// Attribute mapping: (dsl_name, aws_name, updatable_in_place)
pub type AttrMapping = (&'static str, &'static str, bool);

/// Resource type configuration
pub struct ResourceConfig {
    /// Configuration type name (e.g., "odb.network")
    pub resource_type: &'static str,
    /// AWS CloudFormation type name (e.g., "AWS::ODB::OdbNetwork")
    pub aws_type_name: &'static str,
    /// Property holding the remote identifier
    pub identifier: &'static str,
    /// Property of the owning resource, for kinds only readable through
    /// their parent (data sources)
    pub parent_identifier: Option<(&'static str, &'static str)>,
    /// Standard attribute mappings (DSL name -> AWS name)
    pub attributes: &'static [AttrMapping],
}

impl ResourceConfig {
    pub fn attribute(&self, dsl_name: &str) -> Option<&'static AttrMapping> {
        self.attributes.iter().find(|(dsl, _, _)| *dsl == dsl_name)
    }
}

// =============================================================================
// Exadata Infrastructure and VM Clusters
// =============================================================================

pub const CLOUD_EXADATA_INFRASTRUCTURE_CONFIG: ResourceConfig = ResourceConfig {
    resource_type: "odb.cloud_exadata_infrastructure",
    aws_type_name: "AWS::ODB::CloudExadataInfrastructure",
    identifier: "CloudExadataInfrastructureId",
    parent_identifier: None,
    attributes: &[
        ("display_name", "DisplayName", false),
        ("shape", "Shape", false),
        ("availability_zone", "AvailabilityZone", false),
        ("availability_zone_id", "AvailabilityZoneId", false),
        ("compute_count", "ComputeCount", false),
        ("storage_count", "StorageCount", false),
        ("database_server_type", "DatabaseServerType", false),
        ("storage_server_type", "StorageServerType", false),
        (
            "customer_contacts_to_send_to_oci",
            "CustomerContactsToSendToOCI",
            false,
        ),
        ("maintenance_window", "MaintenanceWindow", true),
    ],
};

pub const CLOUD_VM_CLUSTER_CONFIG: ResourceConfig = ResourceConfig {
    resource_type: "odb.cloud_vm_cluster",
    aws_type_name: "AWS::ODB::CloudVmCluster",
    identifier: "CloudVmClusterId",
    parent_identifier: None,
    attributes: &[
        ("display_name", "DisplayName", false),
        (
            "cloud_exadata_infrastructure_id",
            "CloudExadataInfrastructureId",
            false,
        ),
        ("odb_network_id", "OdbNetworkId", false),
        ("cluster_name", "ClusterName", false),
        ("hostname_prefix", "Hostname", false),
        ("gi_version", "GiVersion", false),
        ("cpu_core_count", "CpuCoreCount", false),
        ("memory_size_in_gbs", "MemorySizeInGBs", false),
        ("data_storage_size_in_tbs", "DataStorageSizeInTBs", false),
        ("db_node_storage_size_in_gbs", "DbNodeStorageSizeInGBs", false),
        ("db_servers", "DbServers", false),
        ("ssh_public_keys", "SshPublicKeys", false),
        ("license_model", "LicenseModel", false),
        ("is_local_backup_enabled", "IsLocalBackupEnabled", false),
        ("is_sparse_diskgroup_enabled", "IsSparseDiskgroupEnabled", false),
        ("scan_listener_port_tcp", "ScanListenerPortTcp", false),
        ("time_zone", "TimeZone", false),
        ("data_collection_options", "DataCollectionOptions", false),
    ],
};

pub const CLOUD_AUTONOMOUS_VM_CLUSTER_CONFIG: ResourceConfig = ResourceConfig {
    resource_type: "odb.cloud_autonomous_vm_cluster",
    aws_type_name: "AWS::ODB::CloudAutonomousVmCluster",
    identifier: "CloudAutonomousVmClusterId",
    parent_identifier: None,
    attributes: &[
        ("display_name", "DisplayName", false),
        ("description", "Description", false),
        (
            "cloud_exadata_infrastructure_id",
            "CloudExadataInfrastructureId",
            false,
        ),
        ("odb_network_id", "OdbNetworkId", false),
        (
            "autonomous_data_storage_size_in_tbs",
            "AutonomousDataStorageSizeInTBs",
            false,
        ),
        ("cpu_core_count_per_node", "CpuCoreCountPerNode", false),
        (
            "memory_per_oracle_compute_unit_in_gbs",
            "MemoryPerOracleComputeUnitInGBs",
            false,
        ),
        ("total_container_databases", "TotalContainerDatabases", false),
        ("db_servers", "DbServers", false),
        ("license_model", "LicenseModel", false),
        ("is_mtls_enabled_vm_cluster", "IsMtlsEnabledVmCluster", false),
        ("scan_listener_port_tls", "ScanListenerPortTls", false),
        ("scan_listener_port_non_tls", "ScanListenerPortNonTls", false),
        ("time_zone", "TimeZone", false),
        ("maintenance_window", "MaintenanceWindow", true),
    ],
};

// =============================================================================
// Networking
// =============================================================================

pub const ODB_NETWORK_CONFIG: ResourceConfig = ResourceConfig {
    resource_type: "odb.network",
    aws_type_name: "AWS::ODB::OdbNetwork",
    identifier: "OdbNetworkId",
    parent_identifier: None,
    attributes: &[
        ("display_name", "DisplayName", true),
        ("availability_zone", "AvailabilityZone", false),
        ("availability_zone_id", "AvailabilityZoneId", false),
        ("client_subnet_cidr", "ClientSubnetCidr", false),
        ("backup_subnet_cidr", "BackupSubnetCidr", false),
        ("custom_domain_name", "CustomDomainName", false),
        ("default_dns_prefix", "DefaultDnsPrefix", false),
        ("s3_access", "S3Access", true),
        ("zero_etl_access", "ZeroEtlAccess", true),
        ("s3_policy_document", "S3PolicyDocument", true),
        ("delete_associated_resources", "DeleteAssociatedResources", true),
    ],
};

pub const ODB_PEERING_CONNECTION_CONFIG: ResourceConfig = ResourceConfig {
    resource_type: "odb.network_peering_connection",
    aws_type_name: "AWS::ODB::OdbPeeringConnection",
    identifier: "OdbPeeringConnectionId",
    parent_identifier: None,
    attributes: &[
        ("display_name", "DisplayName", true),
        ("odb_network_id", "OdbNetworkId", false),
        ("peer_network_id", "PeerNetworkId", false),
    ],
};

// =============================================================================
// Data Sources
// =============================================================================

pub const DB_SERVER_CONFIG: ResourceConfig = ResourceConfig {
    resource_type: "odb.db_server",
    aws_type_name: "AWS::ODB::DbServer",
    identifier: "DbServerId",
    parent_identifier: Some((
        "cloud_exadata_infrastructure_id",
        "CloudExadataInfrastructureId",
    )),
    attributes: &[
        ("display_name", "DisplayName", false),
        ("cpu_core_count", "CpuCoreCount", false),
        ("memory_size_in_gbs", "MemorySizeInGBs", false),
        ("db_node_storage_size_in_gbs", "DbNodeStorageSizeInGBs", false),
        ("shape", "Shape", false),
        ("vm_cluster_ids", "VmClusterIds", false),
    ],
};

pub const DB_NODE_CONFIG: ResourceConfig = ResourceConfig {
    resource_type: "odb.db_node",
    aws_type_name: "AWS::ODB::DbNode",
    identifier: "DbNodeId",
    parent_identifier: Some(("cloud_vm_cluster_id", "CloudVmClusterId")),
    attributes: &[
        ("db_server_id", "DbServerId", false),
        ("hostname", "Hostname", false),
        ("cpu_core_count", "CpuCoreCount", false),
        ("memory_size_in_gbs", "MemorySizeInGBs", false),
        ("db_node_storage_size_in_gbs", "DbNodeStorageSizeInGBs", false),
        ("maintenance_type", "MaintenanceType", false),
    ],
};
