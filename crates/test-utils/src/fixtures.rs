//! Synthetic product layouts for tests.
//!
//! Products are written with the folder structure and file names of the
//! real thing, but every raster is a tiny stub: resolution and descriptor
//! extraction only look at names and metadata files.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// A product member: `/`-separated relative path and its content.
pub type Member = (String, Vec<u8>);

/// Well-known product names.
pub mod names {
    pub const LANDSAT8_L1: &str = "LC08_L1TP_200030_20201220_20210310_02_T1";
    pub const LANDSAT9_L2: &str = "LC09_L2SP_200030_20220115_20220117_02_T1";
    pub const LANDSAT5_L1: &str = "LT05_L1TP_200030_20001220_20200906_02_T1";
    pub const LANDSAT8_PRE_COLLECTION: &str = "LC80230302020139LGN00";
    pub const SENTINEL2_L1C: &str = "S2A_MSIL1C_20200518T101120_N0209_R022_T31TCJ_20200518T120345";
    pub const SENTINEL2_L2A: &str = "S2B_MSIL2A_20210712T103629_N0301_R008_T31TCJ_20210712T134225";
    pub const SENTINEL1_GRD: &str =
        "S1A_IW_GRDH_1SDV_20200518T055005_20200518T055030_032626_03C70D_7A8B";
    pub const COSMO_H5: &str = "CSKS2_DGM_B_HI_0A_HH_RA_SF_20201005044010_20201005044017.h5";
}

fn member(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Member {
    (path.into(), content.into())
}

/// Landsat collection layout: MTL text file plus one stub GeoTIFF per band.
pub fn landsat_members(name: &str, bands: &[&str]) -> Vec<Member> {
    let mtl = format!(
        "GROUP = LANDSAT_METADATA_FILE\n  GROUP = IMAGE_ATTRIBUTES\n    SPACECRAFT_ID = \"LANDSAT_8\"\n    DATE_ACQUIRED = {}\n    SCENE_CENTER_TIME = \"10:52:41.1234560Z\"\n  END_GROUP = IMAGE_ATTRIBUTES\nEND_GROUP = LANDSAT_METADATA_FILE\nEND\n",
        landsat_date(name)
    );
    let mut members = vec![member(format!("{}_MTL.txt", name), mtl)];
    for band in bands {
        members.push(member(format!("{}_{}.TIF", name, band), b"stub".to_vec()));
    }
    members.push(member(format!("{}_QA_PIXEL.TIF", name), b"stub".to_vec()));
    members
}

fn landsat_date(name: &str) -> String {
    // Collection names carry YYYYMMDD as their fourth field
    name.split('_')
        .nth(3)
        .filter(|d| d.len() == 8)
        .map(|d| format!("{}-{}-{}", &d[0..4], &d[4..6], &d[6..8]))
        .unwrap_or_else(|| "2020-01-01".to_string())
}

/// Sentinel-2 SAFE layout for a product name (L1C or L2A).
pub fn sentinel2_members(name: &str) -> Vec<Member> {
    let level = if name.contains("MSIL2A") { "L2A" } else { "L1C" };
    let granule = format!("GRANULE/{}_T31TCJ_A025543_20200518T101120", level);
    vec![
        member(format!("MTD_MSI{}.xml", level), "<n1:Level-1C_User_Product/>"),
        member("manifest.safe", "<xfdu:XFDU/>"),
        member(format!("{}/MTD_TL.xml", granule), "<n1:Level-1C_Tile_ID/>"),
        member(format!("{}/IMG_DATA/T31TCJ_20200518T101120_B04.jp2", granule), b"stub".to_vec()),
        member(format!("{}/IMG_DATA/T31TCJ_20200518T101120_B08.jp2", granule), b"stub".to_vec()),
        member(format!("{}/QI_DATA/MSK_CLOUDS_B00.gml", granule), "<eop:Mask/>"),
    ]
}

/// Sentinel-1 SAFE layout with the orbit pass in the manifest.
pub fn sentinel1_members(pass: &str) -> Vec<Member> {
    let stem = "s1a-iw-grd-vv-20200518t055005-20200518t055030-032626-03c70d-001";
    vec![
        member(
            "manifest.safe",
            format!(
                "<xfdu:XFDU><metadataSection><s1:orbitProperties><s1:pass>{}</s1:pass></s1:orbitProperties></metadataSection></xfdu:XFDU>",
                pass
            ),
        ),
        member(format!("annotation/{}.xml", stem), "<product/>"),
        member(format!("annotation/calibration/calibration-{}.xml", stem), "<calibration/>"),
        member(format!("measurement/{}.tiff", stem), b"stub".to_vec()),
    ]
}

/// Write members under `parent/name` and return the product folder.
pub fn write_product_dir(parent: &Path, name: &str, members: &[Member]) -> PathBuf {
    let root = parent.join(name);
    fs::create_dir_all(&root).expect("Failed to create product directory");
    for (path, content) in members {
        let target = root.join(path);
        if let Some(dir) = target.parent() {
            fs::create_dir_all(dir).expect("Failed to create member directory");
        }
        fs::write(&target, content).expect("Failed to write member");
    }
    root
}

/// Write a zip archive, optionally wrapping every member in one folder.
pub fn write_zip(parent: &Path, file_name: &str, wrapper: Option<&str>, members: &[Member]) -> PathBuf {
    let path = parent.join(file_name);
    let file = File::create(&path).expect("Failed to create zip file");
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();

    for (name, content) in members {
        let name = match wrapper {
            Some(w) => format!("{}/{}", w, name),
            None => name.clone(),
        };
        writer.start_file(name, options).expect("Failed to start zip entry");
        writer.write_all(content).expect("Failed to write zip entry");
    }
    writer.finish().expect("Failed to finish zip file");
    path
}

/// Write a tarball, gzip-compressed when `gzip` is set.
pub fn write_tar(parent: &Path, file_name: &str, gzip: bool, members: &[Member]) -> PathBuf {
    let path = parent.join(file_name);
    let file = File::create(&path).expect("Failed to create tar file");

    if gzip {
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::fast());
        let builder = append_tar_members(tar::Builder::new(encoder), members);
        builder
            .into_inner()
            .expect("Failed to finish tar stream")
            .finish()
            .expect("Failed to finish gzip stream");
    } else {
        let builder = append_tar_members(tar::Builder::new(file), members);
        builder.into_inner().expect("Failed to finish tar stream");
    }
    path
}

fn append_tar_members<W: Write>(mut builder: tar::Builder<W>, members: &[Member]) -> tar::Builder<W> {
    for (name, content) in members {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, name, content.as_slice())
            .expect("Failed to append tar entry");
    }
    builder
}
