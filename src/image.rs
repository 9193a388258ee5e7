//! Disk image provisioning into libvirt storage pools.

use std::path::Path;

use tracing::{debug, info, instrument};
use virt::connect::Connect;
use virt::storage_pool::StoragePool;
use virt::storage_vol::StorageVol;
use virt::stream::Stream;

use crate::error::{ImageError, ImageResult};
use crate::scoped::{release_now, Scoped};
use crate::types::VolumeInfo;
use crate::upload::{UploadSource, DEFAULT_CHUNK_SIZE};

/// Provisions disk images as storage volumes.
///
/// Borrows the caller's connection; every daemon handle it acquires is
/// released before the call returns. The caller owns pool handles and may
/// obtain them through [`ImageProvisioner::lookup_pool`].
pub struct ImageProvisioner<'c> {
    conn: &'c Connect,
    chunk_size: usize,
}

impl<'c> ImageProvisioner<'c> {
    /// Create a provisioner on the caller's connection.
    pub fn new(conn: &'c Connect) -> Self {
        Self {
            conn,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Set the upload chunk size in bytes.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Look up an existing storage pool by name.
    ///
    /// The returned handle is owned by the caller.
    pub fn lookup_pool(&self, name: &str) -> ImageResult<StoragePool> {
        StoragePool::lookup_by_name(self.conn, name).map_err(ImageError::libvirt)
    }

    /// Upload the file at `filepath` into a new volume in `pool`.
    ///
    /// `vol_xml` is forwarded to the daemon verbatim and must describe a
    /// volume named `short_name`. If such a volume already exists the call
    /// fails with [`ImageError::AlreadyExists`] and changes nothing. A
    /// failure after volume creation leaves the volume behind in a partial
    /// state; the caller decides whether to remove or retry it.
    #[instrument(skip(self, pool, vol_xml), fields(volume = %short_name))]
    pub fn pull_image(
        &self,
        pool: &StoragePool,
        short_name: &str,
        filepath: &Path,
        vol_xml: &str,
    ) -> ImageResult<()> {
        if let Ok(existing) = StorageVol::lookup_by_name(pool, short_name) {
            release_now(existing);
            return Err(ImageError::AlreadyExists(short_name.to_string()));
        }

        // Local open failures keep their errno; nothing daemon-side has
        // happened yet.
        let mut source = UploadSource::open(filepath)?;

        let vol = Scoped::new(
            StorageVol::create_xml(pool, vol_xml, 0).map_err(ImageError::libvirt)?,
        );
        let stream =
            Scoped::new(Stream::new(self.conn, 0).map_err(ImageError::libvirt)?);
        vol.upload(&stream, 0, 0, 0).map_err(ImageError::libvirt)?;

        let sent = self.drain(&mut source, &stream)?;

        // Finishing consumes the stream; disarm its guard first. An
        // unfinished stream is aborted when its guard frees it.
        stream
            .into_inner()
            .finish()
            .map_err(ImageError::libvirt)?;

        info!(bytes = sent, "image uploaded");
        Ok(())
    }

    /// Pump chunks from `source` into `stream` until end-of-file.
    fn drain(&self, source: &mut UploadSource, stream: &Stream) -> ImageResult<u64> {
        let mut buf = vec![0u8; self.chunk_size];
        let mut total: u64 = 0;
        loop {
            let n = source.read_chunk(&mut buf)?;
            if n == 0 {
                return Ok(total);
            }
            let mut off = 0;
            while off < n {
                let sent = stream.send(&buf[off..n]).map_err(ImageError::libvirt)?;
                off += sent;
            }
            total += n as u64;
            debug!(bytes = total, "upload progress");
        }
    }

    /// Capacity and allocation of the volume named `name` in `pool`.
    #[instrument(skip(self, pool), fields(volume = %name))]
    pub fn volume_info(&self, pool: &StoragePool, name: &str) -> ImageResult<VolumeInfo> {
        let vol = Scoped::new(
            StorageVol::lookup_by_name(pool, name).map_err(ImageError::libvirt)?,
        );
        Self::info_of(&vol)
    }

    /// All volumes currently in `pool`.
    #[instrument(skip(self, pool))]
    pub fn list_volumes(&self, pool: &StoragePool) -> ImageResult<Vec<VolumeInfo>> {
        let names = pool.list_volumes().map_err(ImageError::libvirt)?;

        let mut volumes = Vec::with_capacity(names.len());
        for name in names {
            let vol = Scoped::new(
                StorageVol::lookup_by_name(pool, &name).map_err(ImageError::libvirt)?,
            );
            volumes.push(Self::info_of(&vol)?);
        }
        debug!(count = volumes.len(), "listed volumes");
        Ok(volumes)
    }

    /// Delete the volume named `name` from `pool`, discarding its contents.
    #[instrument(skip(self, pool), fields(volume = %name))]
    pub fn remove_volume(&self, pool: &StoragePool, name: &str) -> ImageResult<()> {
        let vol = Scoped::new(
            StorageVol::lookup_by_name(pool, name).map_err(ImageError::libvirt)?,
        );
        vol.delete(0).map_err(ImageError::libvirt)?;

        info!("volume removed");
        Ok(())
    }

    fn info_of(vol: &StorageVol) -> ImageResult<VolumeInfo> {
        let name = vol.get_name().map_err(ImageError::libvirt)?;
        let info = vol.get_info().map_err(ImageError::libvirt)?;
        Ok(VolumeInfo {
            name,
            capacity: info.capacity,
            allocation: info.allocation,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const TEST_URI: &str = "test:///default";
    const TEST_POOL: &str = "default-pool";

    fn vol_xml(name: &str, capacity: u64) -> String {
        format!(
            "<volume>\
               <name>{name}</name>\
               <capacity unit='bytes'>{capacity}</capacity>\
               <target><path>/default-pool/{name}</path></target>\
             </volume>"
        )
    }

    #[test]
    fn lookup_pool_finds_the_default_pool() {
        let conn = Connect::open(Some(TEST_URI)).unwrap();
        let provisioner = ImageProvisioner::new(&conn);

        assert!(provisioner.lookup_pool(TEST_POOL).is_ok());
        assert!(provisioner.lookup_pool("no-such-pool").is_err());
    }

    #[test]
    fn pull_image_rejects_existing_volume() {
        let conn = Connect::open(Some(TEST_URI)).unwrap();
        let provisioner = ImageProvisioner::new(&conn);
        let pool = provisioner.lookup_pool(TEST_POOL).unwrap();

        let vol =
            StorageVol::create_xml(&pool, &vol_xml("img-taken", 1 << 20), 0).unwrap();
        release_now(vol);

        let mut img = tempfile::NamedTempFile::new().unwrap();
        img.write_all(b"payload").unwrap();

        let err = provisioner
            .pull_image(&pool, "img-taken", img.path(), &vol_xml("img-taken", 1 << 20))
            .unwrap_err();
        assert!(matches!(err, ImageError::AlreadyExists(ref n) if n == "img-taken"));
        assert_eq!(err.code(), 1002);
    }

    #[test]
    fn pull_image_missing_file_creates_no_volume() {
        let conn = Connect::open(Some(TEST_URI)).unwrap();
        let provisioner = ImageProvisioner::new(&conn);
        let pool = provisioner.lookup_pool(TEST_POOL).unwrap();

        let err = provisioner
            .pull_image(
                &pool,
                "img-missing",
                Path::new("/no/such/disk.img"),
                &vol_xml("img-missing", 1 << 20),
            )
            .unwrap_err();

        // errno passthrough, not a daemon error
        assert!(matches!(err, ImageError::Io(_)));
        assert_eq!(err.code(), 2);
        assert!(StorageVol::lookup_by_name(&pool, "img-missing").is_err());
    }

    #[test]
    fn volume_roundtrip_info_list_remove() {
        let conn = Connect::open(Some(TEST_URI)).unwrap();
        let provisioner = ImageProvisioner::new(&conn);
        let pool = provisioner.lookup_pool(TEST_POOL).unwrap();

        let vol =
            StorageVol::create_xml(&pool, &vol_xml("img-info", 2 << 20), 0).unwrap();
        release_now(vol);

        let info = provisioner.volume_info(&pool, "img-info").unwrap();
        assert_eq!(info.name, "img-info");
        assert_eq!(info.capacity, 2 << 20);

        let listed = provisioner.list_volumes(&pool).unwrap();
        assert!(listed.iter().any(|v| v.name == "img-info"));

        provisioner.remove_volume(&pool, "img-info").unwrap();
        assert!(StorageVol::lookup_by_name(&pool, "img-info").is_err());
        assert!(provisioner.volume_info(&pool, "img-info").is_err());
    }
}
