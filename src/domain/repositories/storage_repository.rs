// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use thiserror::Error;

/// 存储错误类型
#[derive(Error, Debug)]
pub enum StorageError {
    /// IO错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 其他存储错误
    #[error("Storage error: {0}")]
    Other(String),
}

/// 已存储对象的元数据
#[derive(Debug, Clone)]
pub struct StoredObject {
    /// 存储后端返回的etag
    pub etag: String,
}

/// 对象存储仓库特质
///
/// 生成产物和源素材的持久化接口
#[async_trait]
pub trait StorageRepository: Send + Sync {
    /// 保存对象
    ///
    /// # 参数
    ///
    /// * `key` - 对象键
    /// * `data` - 对象内容
    /// * `content_type` - 内容类型
    ///
    /// # 返回值
    ///
    /// 返回存储元数据（etag）
    async fn save(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<StoredObject, StorageError>;

    /// 读取对象，不存在时返回None
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// 删除对象，不存在时静默成功
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// 判断对象是否存在
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;
}
