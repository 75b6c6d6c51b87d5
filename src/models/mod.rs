mod category;

pub use category::{
    BatchCategoryRecord, Category, CategoryWithParent, ClosureEdge, MAX_NAME_LENGTH, NewCategory,
    UpdateCategory,
};
