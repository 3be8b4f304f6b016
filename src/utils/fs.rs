//! IO helper: JSON 文档的文件读写

use std::{fs::File, io::BufReader, path::Path};

use serde_json::Value;
use crate::model::session::MapperError;

/// 从文件读取JSON数据
pub fn read_json_file(p: &Path) -> Result<Value, MapperError> {
    let f = File::open(p)?;
    let rdr = BufReader::new(f);
    let v: Value = serde_json::from_reader(rdr)?;
    Ok(v)
}

/// 读取文件原始文本（交给调用方自行解析）
pub fn read_text_file(p: &Path) -> Result<String, MapperError> {
    Ok(std::fs::read_to_string(p)?)
}

/// 将JSON数据保存到文件（格式化输出）
pub fn write_json_file(p: &Path, value: &Value) -> Result<(), MapperError> {
    let f = File::create(p)?;
    serde_json::to_writer_pretty(f, value)?;
    Ok(())
}
