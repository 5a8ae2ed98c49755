/*!
 * Location generator: enumerates candidate data units
 *
 * Walks `<devices>/<device>/<data_dir>/<partition>/...` and lazily
 * yields every regular file carrying the unit suffix. Enumeration is
 * decoupled from validation: nothing the auditor finds inside a unit
 * can truncate the walk, and unreadable subtrees are logged and
 * skipped rather than raised.
 */

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::vec;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Result, VigilError};

/// One candidate data unit, identified for audit and telemetry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUnitLocation {
    pub path: PathBuf,
    pub device: String,
    pub partition: String,
}

/// Mount-point test, injectable so tests never depend on the host's
/// mount table
pub trait MountCheck: Send + Sync {
    fn is_mounted(&self, path: &Path) -> bool;
}

/// Consults the system's mounted-disk list
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemMounts;

impl MountCheck for SystemMounts {
    fn is_mounted(&self, path: &Path) -> bool {
        let path = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        sysinfo::Disks::new_with_refreshed_list()
            .list()
            .iter()
            .any(|disk| disk.mount_point() == path.as_path())
    }
}

struct DeviceEntry {
    name: String,
    data_path: PathBuf,
}

struct PartitionEntry {
    device: String,
    name: String,
    path: PathBuf,
}

struct ActiveWalk {
    device: String,
    partition: String,
    walker: walkdir::IntoIter,
}

/// Lazy, finite iterator over every eligible data unit.
///
/// Construction fails only if the devices root itself is unreadable;
/// every condition below that degrades to a logged skip.
pub struct LocationIter {
    unit_suffix: OsString,
    devices: vec::IntoIter<DeviceEntry>,
    partitions: vec::IntoIter<PartitionEntry>,
    active: Option<ActiveWalk>,
}

impl LocationIter {
    pub fn new(
        devices_root: &Path,
        data_dir: &str,
        unit_suffix: &str,
        mount_check: bool,
        mounts: &dyn MountCheck,
    ) -> Result<Self> {
        let entries = fs::read_dir(devices_root).map_err(|e| VigilError::DevicesRootUnreadable {
            path: devices_root.to_path_buf(),
            source: e,
        })?;

        let mut devices = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(root = %devices_root.display(), error = %err, "unreadable devices entry, skipping");
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if mount_check && !mounts.is_mounted(&path) {
                info!(device = %name, path = %path.display(), "skipping device: not mounted");
                continue;
            }
            devices.push(DeviceEntry {
                name,
                data_path: path.join(data_dir),
            });
        }
        devices.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Self {
            unit_suffix: OsString::from(unit_suffix),
            devices: devices.into_iter(),
            partitions: Vec::new().into_iter(),
            active: None,
        })
    }

    fn partitions_of(device: &DeviceEntry) -> Vec<PartitionEntry> {
        let entries = match fs::read_dir(&device.data_path) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(device = %device.name, path = %device.data_path.display(), "no data directory on device");
                return Vec::new();
            }
            Err(err) => {
                warn!(device = %device.name, path = %device.data_path.display(), error = %err, "unreadable data directory, skipping device");
                return Vec::new();
            }
        };

        let mut partitions = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(device = %device.name, error = %err, "unreadable partition entry, skipping");
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            partitions.push(PartitionEntry {
                device: device.name.clone(),
                name: entry.file_name().to_string_lossy().into_owned(),
                path,
            });
        }
        partitions.sort_by(|a, b| a.name.cmp(&b.name));
        partitions
    }
}

impl Iterator for LocationIter {
    type Item = DataUnitLocation;

    fn next(&mut self) -> Option<DataUnitLocation> {
        loop {
            if let Some(mut active) = self.active.take() {
                loop {
                    match active.walker.next() {
                        None => break,
                        Some(Err(err)) => {
                            warn!(
                                device = %active.device,
                                partition = %active.partition,
                                error = %err,
                                "unreadable entry during partition walk, skipping"
                            );
                        }
                        Some(Ok(entry)) => {
                            if entry.file_type().is_file()
                                && entry.path().extension() == Some(self.unit_suffix.as_os_str())
                            {
                                let location = DataUnitLocation {
                                    path: entry.into_path(),
                                    device: active.device.clone(),
                                    partition: active.partition.clone(),
                                };
                                self.active = Some(active);
                                return Some(location);
                            }
                        }
                    }
                }
            }

            if let Some(partition) = self.partitions.next() {
                self.active = Some(ActiveWalk {
                    device: partition.device,
                    partition: partition.name,
                    walker: WalkDir::new(&partition.path)
                        .sort_by_file_name()
                        .into_iter(),
                });
                continue;
            }

            let device = self.devices.next()?;
            self.partitions = Self::partitions_of(&device).into_iter();
        }
    }
}
