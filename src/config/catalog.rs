//! Option catalog.
//!
//! The closed set of configuration options understood by the enclave runtime,
//! described by one [`OptionDescriptor`] per key. The validator, the store and
//! the operator CLI all iterate this table instead of hardcoding per-key logic.
//!
//! # Design Decisions
//! - Keys are a closed enum; lookups are total and cannot fail at runtime
//! - Descriptors are plain data built with `const` builders
//! - The built-in catalog is created once and shared behind an `Arc`

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

/// Environment variable prefix used by the runtime for option overrides.
pub const ENV_PREFIX: &str = "SGXLKL_";

macro_rules! option_keys {
    ($($variant:ident => $name:literal,)+) => {
        /// Identifier of a configuration option.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum OptionKey {
            $($variant,)+
        }

        impl OptionKey {
            /// Every key, in catalog order.
            pub const ALL: &'static [OptionKey] = &[$(OptionKey::$variant,)+];

            /// Option name as written in configuration documents.
            pub const fn name(self) -> &'static str {
                match self {
                    $(OptionKey::$variant => $name,)+
                }
            }
        }
    };
}

option_keys! {
    AppConfig => "app_config",
    Cmdline => "cmdline",
    Cwd => "cwd",
    DebugMount => "debugmount",
    DpdkIp4 => "dpdk_ip4",
    DpdkGw4 => "dpdk_gw4",
    DpdkMask4 => "dpdk_mask4",
    DpdkIp6 => "dpdk_ip6",
    DpdkGw6 => "dpdk_gw6",
    DpdkMask6 => "dpdk_mask6",
    DpdkMtu => "dpdk_mtu",
    Espins => "espins",
    Esleep => "esleep",
    Ethreads => "ethreads",
    EthreadsAffinity => "ethreads_affinity",
    GettimeVdso => "gettime_vdso",
    Gw4 => "gw4",
    Gw6 => "gw6",
    Hd => "hd",
    HdKey => "hd_key",
    HdRo => "hd_ro",
    Hds => "hds",
    HdVerity => "hd_verity",
    HdVerityOffset => "hd_verity_offset",
    Heap => "heap",
    Hostname => "hostname",
    Hostnet => "hostnet",
    IasCert => "ias_cert",
    IasKeyFile => "ias_key_file",
    IasQuoteType => "ias_quote_type",
    IasServer => "ias_server",
    IasSpid => "ias_spid",
    Ip4 => "ip4",
    Ip6 => "ip6",
    KernelVerbose => "kernel_verbose",
    Key => "key",
    Mask4 => "mask4",
    Mask6 => "mask6",
    MaxUserThreads => "max_user_threads",
    MmapFiles => "mmap_files",
    NonPie => "non_pie",
    PrintAppRuntime => "print_app_runtime",
    PrintHostSyscallStats => "print_host_syscall_stats",
    RealTimePrio => "real_time_prio",
    RemoteAttestPort => "remote_attest_port",
    RemoteCmdPort => "remote_cmd_port",
    RemoteCmdEth0 => "remote_cmd_eth0",
    RemoteConfig => "remote_config",
    ReportNonce => "report_nonce",
    ShmemFile => "shmem_file",
    ShmemSize => "shmem_size",
    Sigpipe => "sigpipe",
    Ssleep => "ssleep",
    Sspins => "sspins",
    StackSize => "stack_size",
    Sthreads => "sthreads",
    SthreadsAffinity => "sthreads_affinity",
    Tap => "tap",
    TapMtu => "tap_mtu",
    TapOffload => "tap_offload",
    TraceHostSyscall => "trace_host_syscall",
    TraceInternalSyscall => "trace_internal_syscall",
    TraceLklSyscall => "trace_lkl_syscall",
    TraceMmap => "trace_mmap",
    TraceSyscall => "trace_syscall",
    TraceThread => "trace_thread",
    Verbose => "verbose",
    WgIp => "wg_ip",
    WgPort => "wg_port",
    WgKey => "wg_key",
    WgPeers => "wg_peers",
}

impl OptionKey {
    /// Number of options in the closed key space.
    pub const COUNT: usize = Self::ALL.len();

    /// Position of this key in the catalog and in every store.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Look up a key by its document name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|key| key.name() == name)
    }

    /// Environment variable carrying an override for this option.
    pub fn env_var(self) -> String {
        format!("{}{}", ENV_PREFIX, self.name().to_ascii_uppercase())
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Declared value type of an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionType {
    Bool,
    U64,
    Str,
    StrList,
    /// List of sub-mappings described by a [`RecordSchema`].
    Records,
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OptionType::Bool => "boolean",
            OptionType::U64 => "unsigned 64-bit integer",
            OptionType::Str => "string",
            OptionType::StrList => "string list",
            OptionType::Records => "record list",
        };
        f.write_str(name)
    }
}

/// Compiled-in default of an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultValue {
    /// No default; the option resolves to no value unless supplied.
    None,
    Bool(bool),
    U64(u64),
    Str(&'static str),
    /// Empty list, for list and record options.
    Empty,
}

impl fmt::Display for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::None => f.write_str("-"),
            DefaultValue::Bool(value) => write!(f, "{}", value),
            DefaultValue::U64(value) => write!(f, "{}", value),
            DefaultValue::Str(value) => write!(f, "{:?}", value),
            DefaultValue::Empty => f.write_str("[]"),
        }
    }
}

/// Value constraint checked after coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bounds {
    None,
    /// Inclusive numeric range.
    Range { min: u64, max: u64 },
    /// Allowed string values.
    OneOf(&'static [&'static str]),
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bounds::None => f.write_str("any"),
            Bounds::Range { min, max } => write!(f, "[{}, {}]", min, max),
            Bounds::OneOf(values) => write!(f, "one of {}", values.join(", ")),
        }
    }
}

/// Shape a string value must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrFormat {
    Any,
    Ipv4,
    Ipv6,
    Hex,
    /// 32-byte key in standard base64, as WireGuard prints them.
    Base64Key,
    HostPort,
    AbsolutePath,
    /// CPU index or inclusive `lo-hi` range.
    CpuRange,
    /// Embedded application sub-configuration.
    AppDocument,
}

impl StrFormat {
    /// Human readable description used in type-mismatch errors.
    pub fn describe(self) -> &'static str {
        match self {
            StrFormat::Any => "string",
            StrFormat::Ipv4 => "IPv4 address",
            StrFormat::Ipv6 => "IPv6 address",
            StrFormat::Hex => "hexadecimal string",
            StrFormat::Base64Key => "base64-encoded 32-byte key",
            StrFormat::HostPort => "host:port",
            StrFormat::AbsolutePath => "absolute path",
            StrFormat::CpuRange => "CPU index or range",
            StrFormat::AppDocument => "application config document",
        }
    }
}

/// Unit of an unsigned option, controlling which textual forms it accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Count,
    /// Byte sizes accept `K`, `M` and `G` suffixes.
    Bytes,
}

/// Tag shared by options of which at most one may be set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExclusionGroup {
    /// Host passthrough, tap device or DPDK NIC.
    NetworkMode,
}

impl ExclusionGroup {
    pub fn name(self) -> &'static str {
        match self {
            ExclusionGroup::NetworkMode => "network_mode",
        }
    }
}

impl fmt::Display for ExclusionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One field of a record-list entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordField {
    pub name: &'static str,
    /// `Bool`, `U64` or `Str`.
    pub ty: OptionType,
    pub format: StrFormat,
    pub required: bool,
    /// Field that must also be present when this one is.
    pub requires: Option<&'static str>,
}

impl RecordField {
    const fn new(name: &'static str, ty: OptionType) -> Self {
        Self {
            name,
            ty,
            format: StrFormat::Any,
            required: false,
            requires: None,
        }
    }

    pub const fn string(name: &'static str) -> Self {
        Self::new(name, OptionType::Str)
    }

    pub const fn flag(name: &'static str) -> Self {
        Self::new(name, OptionType::Bool)
    }

    pub const fn uint(name: &'static str) -> Self {
        Self::new(name, OptionType::U64)
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn format(mut self, format: StrFormat) -> Self {
        self.format = format;
        self
    }

    pub const fn requires(mut self, field: &'static str) -> Self {
        self.requires = Some(field);
        self
    }
}

/// Layout of the entries of a record-list option.
///
/// Field order is also the positional order of the compact text form
/// (`a:b:c,a:b:c`).
#[derive(Debug, PartialEq, Eq)]
pub struct RecordSchema {
    pub name: &'static str,
    pub fields: &'static [RecordField],
}

impl RecordSchema {
    pub fn field(&self, name: &str) -> Option<&RecordField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Disk image mounted inside the enclave.
pub static DISK_RECORD: RecordSchema = RecordSchema {
    name: "disk",
    fields: &[
        RecordField::string("path").required(),
        RecordField::string("mnt")
            .required()
            .format(StrFormat::AbsolutePath),
        RecordField::flag("ro"),
        RecordField::string("key").format(StrFormat::Hex),
        RecordField::string("verity").format(StrFormat::Hex),
        RecordField::uint("verity_offset").requires("verity"),
    ],
};

/// WireGuard peer of the enclave tunnel.
pub static WG_PEER_RECORD: RecordSchema = RecordSchema {
    name: "wireguard peer",
    fields: &[
        RecordField::string("key")
            .required()
            .format(StrFormat::Base64Key),
        RecordField::string("allowed_ips").required(),
        RecordField::string("endpoint").format(StrFormat::HostPort),
    ],
};

/// Compiled-in description of one option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionDescriptor {
    pub key: OptionKey,
    pub ty: OptionType,
    pub default: DefaultValue,
    pub bounds: Bounds,
    pub format: StrFormat,
    pub unit: Unit,
    /// Absence without a default is an error.
    pub required: bool,
    pub exclusion: Option<ExclusionGroup>,
    /// Member of the subset the remote channel may replace after boot.
    pub remote_updatable: bool,
    /// Value is key material or otherwise never printed.
    pub sensitive: bool,
    pub record: Option<&'static RecordSchema>,
    pub summary: &'static str,
}

impl OptionDescriptor {
    const fn new(
        key: OptionKey,
        ty: OptionType,
        default: DefaultValue,
        summary: &'static str,
    ) -> Self {
        Self {
            key,
            ty,
            default,
            bounds: Bounds::None,
            format: StrFormat::Any,
            unit: Unit::Count,
            required: false,
            exclusion: None,
            remote_updatable: false,
            sensitive: false,
            record: None,
            summary,
        }
    }

    pub const fn flag(key: OptionKey, default: bool, summary: &'static str) -> Self {
        Self::new(key, OptionType::Bool, DefaultValue::Bool(default), summary)
    }

    pub const fn uint(key: OptionKey, default: u64, summary: &'static str) -> Self {
        Self::new(key, OptionType::U64, DefaultValue::U64(default), summary)
    }

    pub const fn string(
        key: OptionKey,
        default: Option<&'static str>,
        summary: &'static str,
    ) -> Self {
        let default = match default {
            Some(value) => DefaultValue::Str(value),
            None => DefaultValue::None,
        };
        Self::new(key, OptionType::Str, default, summary)
    }

    pub const fn list(key: OptionKey, summary: &'static str) -> Self {
        Self::new(key, OptionType::StrList, DefaultValue::Empty, summary)
    }

    pub const fn records(
        key: OptionKey,
        schema: &'static RecordSchema,
        summary: &'static str,
    ) -> Self {
        let mut descriptor = Self::new(key, OptionType::Records, DefaultValue::Empty, summary);
        descriptor.record = Some(schema);
        descriptor
    }

    pub const fn range(mut self, min: u64, max: u64) -> Self {
        self.bounds = Bounds::Range { min, max };
        self
    }

    pub const fn one_of(mut self, values: &'static [&'static str]) -> Self {
        self.bounds = Bounds::OneOf(values);
        self
    }

    pub const fn format(mut self, format: StrFormat) -> Self {
        self.format = format;
        self
    }

    pub const fn bytes(mut self) -> Self {
        self.unit = Unit::Bytes;
        self
    }

    /// Mark the option required and drop its default.
    pub const fn required(mut self) -> Self {
        self.required = true;
        self.default = DefaultValue::None;
        self
    }

    pub const fn exclusive(mut self, group: ExclusionGroup) -> Self {
        self.exclusion = Some(group);
        self
    }

    pub const fn remote(mut self) -> Self {
        self.remote_updatable = true;
        self
    }

    pub const fn secret(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

/// Dependent option that is meaningless without its prerequisite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    pub dependent: OptionKey,
    pub prerequisite: OptionKey,
}

const KIB: u64 = 1024;
const MIB: u64 = 1024 * 1024;

const MAX_ETHREADS: u64 = 1024;
const MAX_STHREADS: u64 = 1024;
const MAX_MAX_USER_THREADS: u64 = 65536;
const MIN_MTU: u64 = 68;
const MAX_PORT: u64 = 65535;

use OptionKey as K;

static BUILTIN_DESCRIPTORS: [OptionDescriptor; OptionKey::COUNT] = [
    OptionDescriptor::string(K::AppConfig, None, "Application run configuration document")
        .format(StrFormat::AppDocument)
        .remote()
        .secret(),
    OptionDescriptor::string(K::Cmdline, None, "Linux kernel command line"),
    OptionDescriptor::string(K::Cwd, Some("/"), "Working directory of the application")
        .format(StrFormat::AbsolutePath)
        .remote(),
    OptionDescriptor::string(K::DebugMount, None, "Host directory exposed for debugging"),
    OptionDescriptor::string(K::DpdkIp4, Some("10.0.2.1"), "IPv4 address of the DPDK interface")
        .format(StrFormat::Ipv4)
        .exclusive(ExclusionGroup::NetworkMode),
    OptionDescriptor::string(K::DpdkGw4, Some("10.0.2.254"), "IPv4 gateway of the DPDK interface")
        .format(StrFormat::Ipv4),
    OptionDescriptor::uint(K::DpdkMask4, 24, "IPv4 prefix length of the DPDK interface")
        .range(0, 32),
    OptionDescriptor::string(
        K::DpdkIp6,
        Some("fdbf:9188:5fbd:a895::1"),
        "IPv6 address of the DPDK interface",
    )
    .format(StrFormat::Ipv6),
    OptionDescriptor::string(K::DpdkGw6, Some("fe80::1"), "IPv6 gateway of the DPDK interface")
        .format(StrFormat::Ipv6),
    OptionDescriptor::uint(K::DpdkMask6, 64, "IPv6 prefix length of the DPDK interface")
        .range(0, 128),
    OptionDescriptor::uint(K::DpdkMtu, 1500, "MTU of the DPDK interface").range(MIN_MTU, MAX_PORT),
    OptionDescriptor::uint(K::Espins, 500, "Enclave thread spin iterations before sleeping"),
    OptionDescriptor::uint(K::Esleep, 16000, "Enclave thread sleep time in nanoseconds"),
    OptionDescriptor::uint(K::Ethreads, 1, "Number of enclave threads").range(1, MAX_ETHREADS),
    OptionDescriptor::list(K::EthreadsAffinity, "CPUs enclave threads are pinned to")
        .format(StrFormat::CpuRange),
    OptionDescriptor::flag(K::GettimeVdso, true, "Serve clock_gettime from the vDSO"),
    OptionDescriptor::string(K::Gw4, Some("10.0.1.254"), "IPv4 gateway of the tap interface")
        .format(StrFormat::Ipv4),
    OptionDescriptor::string(K::Gw6, Some("fe80::1"), "IPv6 gateway of the tap interface")
        .format(StrFormat::Ipv6),
    OptionDescriptor::string(K::Hd, None, "Root disk image"),
    OptionDescriptor::string(K::HdKey, None, "Encryption key of the root disk")
        .format(StrFormat::Hex)
        .remote()
        .secret(),
    OptionDescriptor::flag(K::HdRo, false, "Mount the root disk read-only"),
    OptionDescriptor::records(K::Hds, &DISK_RECORD, "Additional disk images")
        .remote()
        .secret(),
    OptionDescriptor::string(K::HdVerity, None, "dm-verity root hash of the root disk")
        .format(StrFormat::Hex),
    OptionDescriptor::uint(K::HdVerityOffset, 0, "Offset of the dm-verity hash tree"),
    OptionDescriptor::uint(K::Heap, 200 * MIB, "Enclave heap size in bytes")
        .bytes()
        .range(4 * KIB, u64::MAX),
    OptionDescriptor::string(K::Hostname, Some("lkl"), "Hostname inside the enclave"),
    OptionDescriptor::flag(K::Hostnet, false, "Use the host network stack")
        .exclusive(ExclusionGroup::NetworkMode),
    OptionDescriptor::string(K::IasCert, None, "Client certificate for the attestation service"),
    OptionDescriptor::string(K::IasKeyFile, None, "Client key for the attestation service"),
    OptionDescriptor::string(K::IasQuoteType, Some("Unlinkable"), "Attestation quote type")
        .one_of(&["Linkable", "Unlinkable"]),
    OptionDescriptor::string(
        K::IasServer,
        Some("test-as.sgx.trustedservices.intel.com:443"),
        "Attestation service endpoint",
    )
    .format(StrFormat::HostPort),
    OptionDescriptor::string(K::IasSpid, None, "Service provider ID for attestation")
        .format(StrFormat::Hex),
    OptionDescriptor::string(K::Ip4, Some("10.0.1.1"), "IPv4 address of the tap interface")
        .format(StrFormat::Ipv4),
    OptionDescriptor::string(
        K::Ip6,
        Some("fd16:012a:4639:184d::1"),
        "IPv6 address of the tap interface",
    )
    .format(StrFormat::Ipv6),
    OptionDescriptor::flag(K::KernelVerbose, false, "Print kernel messages"),
    OptionDescriptor::string(K::Key, None, "Enclave signing key").secret(),
    OptionDescriptor::uint(K::Mask4, 24, "IPv4 prefix length of the tap interface").range(0, 32),
    OptionDescriptor::uint(K::Mask6, 64, "IPv6 prefix length of the tap interface").range(0, 128),
    OptionDescriptor::uint(K::MaxUserThreads, 256, "Maximum number of application threads")
        .range(1, MAX_MAX_USER_THREADS),
    OptionDescriptor::string(K::MmapFiles, Some("None"), "File-backed mmap support")
        .one_of(&["Shared", "Private", "None"]),
    OptionDescriptor::flag(K::NonPie, false, "Application is not position independent"),
    OptionDescriptor::flag(K::PrintAppRuntime, false, "Print application runtime on exit"),
    OptionDescriptor::flag(K::PrintHostSyscallStats, false, "Print host syscall statistics"),
    OptionDescriptor::flag(K::RealTimePrio, false, "Run enclave threads at real-time priority"),
    OptionDescriptor::uint(K::RemoteAttestPort, 56000, "Port of the remote attestation service")
        .range(1, MAX_PORT),
    OptionDescriptor::uint(K::RemoteCmdPort, 56001, "Port of the remote control service")
        .range(1, MAX_PORT),
    OptionDescriptor::flag(K::RemoteCmdEth0, false, "Bind remote control to eth0"),
    OptionDescriptor::flag(K::RemoteConfig, false, "Accept configuration over the remote channel"),
    OptionDescriptor::uint(K::ReportNonce, 0, "Nonce embedded in the attestation report"),
    OptionDescriptor::string(K::ShmemFile, None, "Shared memory file name"),
    OptionDescriptor::uint(K::ShmemSize, 0, "Shared memory size in bytes").bytes(),
    OptionDescriptor::flag(K::Sigpipe, false, "Deliver SIGPIPE to the application"),
    OptionDescriptor::uint(K::Ssleep, 4000, "Scheduler thread sleep time in nanoseconds"),
    OptionDescriptor::uint(K::Sspins, 100, "Scheduler thread spin iterations before sleeping"),
    OptionDescriptor::uint(K::StackSize, 512 * KIB, "Stack size of application threads")
        .bytes()
        .range(4 * KIB, u64::MAX),
    OptionDescriptor::uint(K::Sthreads, 4, "Number of worker threads").range(1, MAX_STHREADS),
    OptionDescriptor::list(K::SthreadsAffinity, "CPUs worker threads are pinned to")
        .format(StrFormat::CpuRange),
    OptionDescriptor::string(K::Tap, Some("sgxlkl_tap0"), "Host tap device")
        .exclusive(ExclusionGroup::NetworkMode),
    OptionDescriptor::uint(K::TapMtu, 1500, "MTU of the tap interface").range(MIN_MTU, MAX_PORT),
    OptionDescriptor::flag(K::TapOffload, false, "Enable tap checksum and segmentation offload"),
    OptionDescriptor::flag(K::TraceHostSyscall, false, "Trace host syscalls"),
    OptionDescriptor::flag(K::TraceInternalSyscall, false, "Trace internal syscalls"),
    OptionDescriptor::flag(K::TraceLklSyscall, false, "Trace kernel syscalls"),
    OptionDescriptor::flag(K::TraceMmap, false, "Trace mmap calls"),
    OptionDescriptor::flag(K::TraceSyscall, false, "Trace all syscalls"),
    OptionDescriptor::flag(K::TraceThread, false, "Trace thread scheduling"),
    OptionDescriptor::flag(K::Verbose, false, "Verbose runtime output"),
    OptionDescriptor::string(K::WgIp, Some("10.0.2.1"), "IPv4 address of the WireGuard interface")
        .format(StrFormat::Ipv4),
    OptionDescriptor::uint(K::WgPort, 56002, "WireGuard listen port").range(1, MAX_PORT),
    OptionDescriptor::string(K::WgKey, None, "WireGuard private key")
        .format(StrFormat::Base64Key)
        .secret(),
    OptionDescriptor::records(K::WgPeers, &WG_PEER_RECORD, "WireGuard peers").remote(),
];

static BUILTIN_DEPENDENCIES: &[Dependency] = &[
    Dependency {
        dependent: K::HdVerityOffset,
        prerequisite: K::HdVerity,
    },
    Dependency {
        dependent: K::ShmemSize,
        prerequisite: K::ShmemFile,
    },
    Dependency {
        dependent: K::IasCert,
        prerequisite: K::IasKeyFile,
    },
    Dependency {
        dependent: K::IasKeyFile,
        prerequisite: K::IasCert,
    },
];

static BUILTIN: LazyLock<Arc<Catalog>> = LazyLock::new(|| {
    Arc::new(Catalog {
        descriptors: BUILTIN_DESCRIPTORS.to_vec(),
        dependencies: BUILTIN_DEPENDENCIES.to_vec(),
    })
});

/// Option table consulted by the validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    descriptors: Vec<OptionDescriptor>,
    dependencies: Vec<Dependency>,
}

impl Catalog {
    /// The compiled-in catalog of the runtime.
    pub fn builtin() -> Arc<Catalog> {
        Arc::clone(&BUILTIN)
    }

    /// Descriptor of `key`.
    pub fn lookup(&self, key: OptionKey) -> &OptionDescriptor {
        &self.descriptors[key.index()]
    }

    /// All descriptors, in key order.
    pub fn descriptors(&self) -> &[OptionDescriptor] {
        &self.descriptors
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Members of every exclusion group, in key order.
    pub fn exclusion_groups(&self) -> BTreeMap<ExclusionGroup, Vec<OptionKey>> {
        let mut groups: BTreeMap<ExclusionGroup, Vec<OptionKey>> = BTreeMap::new();
        for descriptor in &self.descriptors {
            if let Some(group) = descriptor.exclusion {
                groups.entry(group).or_default().push(descriptor.key);
            }
        }
        groups
    }

    /// Keys the remote channel may replace.
    pub fn remote_updatable(&self) -> impl Iterator<Item = OptionKey> + '_ {
        self.descriptors
            .iter()
            .filter(|d| d.remote_updatable)
            .map(|d| d.key)
    }

    /// Derive a catalog with one descriptor replaced.
    pub fn with_descriptor(mut self, descriptor: OptionDescriptor) -> Self {
        self.descriptors[descriptor.key.index()] = descriptor;
        self
    }

    /// Derive a catalog with an additional dependency rule.
    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_table_is_indexed_by_key() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.descriptors().len(), 71);
        for (index, descriptor) in catalog.descriptors().iter().enumerate() {
            assert_eq!(descriptor.key.index(), index, "{} out of place", descriptor.key);
        }
    }

    #[test]
    fn test_names_round_trip() {
        for key in OptionKey::ALL {
            assert_eq!(OptionKey::from_name(key.name()), Some(*key));
        }
        assert_eq!(OptionKey::from_name("sthread"), None);
        assert_eq!(OptionKey::HdVerityOffset.env_var(), "SGXLKL_HD_VERITY_OFFSET");
    }

    #[test]
    fn test_scalar_options_always_have_defaults() {
        for descriptor in Catalog::builtin().descriptors() {
            match descriptor.ty {
                OptionType::Bool => assert!(matches!(descriptor.default, DefaultValue::Bool(_))),
                OptionType::U64 => assert!(matches!(descriptor.default, DefaultValue::U64(_))),
                OptionType::StrList | OptionType::Records => {
                    assert_eq!(descriptor.default, DefaultValue::Empty)
                }
                OptionType::Str => {}
            }
            assert_eq!(descriptor.ty == OptionType::Records, descriptor.record.is_some());
        }
    }

    #[test]
    fn test_defaults_lie_within_bounds() {
        for descriptor in Catalog::builtin().descriptors() {
            match (descriptor.bounds, descriptor.default) {
                (Bounds::Range { min, max }, DefaultValue::U64(value)) => {
                    assert!(min <= value && value <= max, "{}", descriptor.key)
                }
                (Bounds::OneOf(values), DefaultValue::Str(value)) => {
                    assert!(values.contains(&value), "{}", descriptor.key)
                }
                _ => {}
            }
        }
    }

    #[test]
    fn test_network_mode_group() {
        let groups = Catalog::builtin().exclusion_groups();
        assert_eq!(
            groups[&ExclusionGroup::NetworkMode],
            vec![K::DpdkIp4, K::Hostnet, K::Tap]
        );
    }

    #[test]
    fn test_thread_defaults() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.lookup(K::Sthreads).default, DefaultValue::U64(4));
        assert_eq!(catalog.lookup(K::Ethreads).default, DefaultValue::U64(1));
        assert_eq!(
            catalog.lookup(K::Ethreads).bounds,
            Bounds::Range { min: 1, max: 1024 }
        );
    }

    #[test]
    fn test_with_descriptor_replaces_entry() {
        let catalog = Catalog::builtin()
            .as_ref()
            .clone()
            .with_descriptor(OptionDescriptor::string(K::Hd, None, "Root disk image").required());
        assert!(catalog.lookup(K::Hd).required);
        assert!(!Catalog::builtin().lookup(K::Hd).required);
    }
}
